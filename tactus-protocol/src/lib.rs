//! Line-oriented serial command protocol for the Tactus sequencer
//!
//! One command per line, matched by a case-sensitive 3-byte prefix;
//! responses are printed lines. This crate parses incoming lines into
//! [`Command`] values and renders the fixed response formats - it
//! knows nothing about lifecycle gating, which the interpreter task
//! enforces.

#![no_std]
#![deny(unsafe_code)]

mod command;
mod render;

pub use command::{ClockCommand, Command, PairLine, ParseError};
pub use render::{write_pair, write_current, write_status};
