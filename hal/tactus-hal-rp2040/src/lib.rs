//! RP2040-specific drivers for the Tactus sequencer firmware
//!
//! This crate owns every piece of RP2040 hardware the sequencer
//! touches:
//!
//! - The PIO/DMA output pipeline (implements `tactus_core::engine::Pipeline`)
//! - Manual output pin access for the `man`/`gto` commands
//! - System clock control: internal PLL, external GPIN sync,
//!   fault-recovery (resus), hardware frequency counters

#![no_std]

pub mod clock;
pub mod outputs;
pub mod sequencer;
