//! Board-agnostic core logic for the Tactus sequencer firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Command buffer storage and hold-value encoding
//! - Execution lifecycle state machine
//! - The arm/monitor/teardown execution cycle, behind a pipeline trait
//! - Clock source policy types

#![no_std]
#![deny(unsafe_code)]

pub mod buffer;
pub mod clock;
pub mod engine;
pub mod state;
