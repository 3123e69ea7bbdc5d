//! Board-level constants for the Raspberry Pi Pico build
//!
//! Pin map:
//! - GPIO 0-15: sequenced outputs (PIO0, or SIO during manual writes)
//! - GPIO 16: hardware trigger input
//! - GPIO 20: external clock sync input (clock GPIN0)
//! - GPIO 25: onboard LED
//! - GPIO 28/29: console UART0 TX/RX

/// Flat word capacity of the command buffer (two words per step).
///
/// 60000 words is 240K of RAM, nearly all of the RP2040's 264K.
pub const BUFFER_WORDS: usize = 60_000;

/// Console UART baud rate
pub const CONSOLE_BAUD: u32 = 115_200;

/// Maximum accepted command line length, terminator excluded
pub const LINE_LEN: usize = 256;
