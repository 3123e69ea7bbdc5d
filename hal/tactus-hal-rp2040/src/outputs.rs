//! Direct output pin access
//!
//! The sequencer drives GPIO 0-15. During buffered execution the pins
//! belong to PIO0; the `man` command drives them directly from the
//! CPU instead, which requires flipping the pad function back to SIO.
//! Arming the pipeline reclaims the pins for PIO, so a manual write
//! never disconnects a later run.

use embassy_rp::pac;

/// First output pin
pub const OUTPUT_PIN_BASE: u8 = 0;

/// Number of sequenced output pins
pub const OUTPUT_WIDTH: u8 = 16;

/// Mask of all pins under sequencer control
pub const OUTPUT_MASK: u32 = ((1u32 << OUTPUT_WIDTH) - 1) << OUTPUT_PIN_BASE;

/// IO_BANK0 funcsel values (RP2040 datasheet table 283)
const FUNCSEL_PIO0: u8 = 6;
const FUNCSEL_SIO: u8 = 5;

fn set_output_funcsel(funcsel: u8) {
    for pin in OUTPUT_PIN_BASE..OUTPUT_PIN_BASE + OUTPUT_WIDTH {
        pac::IO_BANK0
            .gpio(pin as usize)
            .ctrl()
            .write(|w| w.set_funcsel(funcsel));
    }
}

/// Hand the output pins to the CPU and drive them to `value`.
///
/// Only the bits inside [`OUTPUT_MASK`] are affected. Idle-state
/// gating is the caller's job; this takes effect immediately.
pub fn manual_write(value: u32) {
    set_output_funcsel(FUNCSEL_SIO);
    pac::SIO.gpio_oe(0).value_set().write_value(OUTPUT_MASK);

    let value = value << OUTPUT_PIN_BASE;
    pac::SIO
        .gpio_out(0)
        .value_set()
        .write_value(value & OUTPUT_MASK);
    pac::SIO
        .gpio_out(0)
        .value_clr()
        .write_value(!value & OUTPUT_MASK);
}

/// Read back the current state of the sequenced pins, masked and
/// shifted down to bit 0
pub fn read_outputs() -> u32 {
    (pac::SIO.gpio_in(0).read() & OUTPUT_MASK) >> OUTPUT_PIN_BASE
}

/// Hand the output pins back to PIO0.
///
/// Called on every arm so the pipeline owns the pins regardless of
/// any manual writes since the last run.
pub(crate) fn claim_for_pio() {
    set_output_funcsel(FUNCSEL_PIO0);
}
