//! System clock control
//!
//! The sequencer timing base is `clk_sys`. It either runs from the
//! internal PLL (calibrated default 100 MHz) or locks to a reference
//! presented on the external sync pin (GPIO 20, clock GPIN0).
//!
//! The RP2040 resus unit watches `clk_sys`; if the active source
//! halts or goes invalid it forcibly switches back to the reference
//! clock and raises `CLOCKS_IRQ`. [`on_resus_irq`] is the recovery
//! hook: it reverts to the internal default, detaches the sync pin,
//! and re-times the console UART. It runs in interrupt context and
//! must never take the lifecycle lock or touch the command buffer.
//!
//! Mode and frequency live in atomics so the status path and the IRQ
//! handler need no locking.

use core::fmt::{self, Write};

use embassy_rp::interrupt::typelevel::{Binding, Handler, CLOCKS_IRQ};
use embassy_rp::pac;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use tactus_core::clock::{ClockMode, INTERNAL_DEFAULT_HZ};

/// Crystal oscillator frequency (reference clock)
pub const XOSC_HZ: u32 = 12_000_000;

/// GPIO carrying the external sync reference (clock GPIN0)
pub const SYNC_GPIO: u8 = 20;

/// IO_BANK0 funcsel for the clock GPIN function on GPIO 20
const FUNCSEL_GPIN: u8 = 8;
/// IO_BANK0 funcsel for no function
const FUNCSEL_NULL: u8 = 31;

static CLOCK_MODE: AtomicU8 = AtomicU8::new(ClockMode::Internal as u8);
static CLOCK_FREQ_HZ: AtomicU32 = AtomicU32::new(INTERNAL_DEFAULT_HZ);
static CONSOLE_BAUD: AtomicU32 = AtomicU32::new(115_200);
static RESUS_NOTICE: AtomicBool = AtomicBool::new(false);

/// PLL_SYS configuration for one output frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllParams {
    pub fbdiv: u16,
    pub postdiv1: u8,
    pub postdiv2: u8,
}

/// Find PLL_SYS dividers producing exactly `target_hz` from the
/// crystal, or `None` if the frequency is not synthesizable.
///
/// VCO range and divider bounds per the RP2040 datasheet. Higher VCO
/// frequencies are preferred for lower jitter, so the feedback
/// divider is searched from the top.
pub fn pll_sys_params(target_hz: u32) -> Option<PllParams> {
    if target_hz == 0 {
        return None;
    }
    for fbdiv in (16u32..=320).rev() {
        let vco = (XOSC_HZ as u64) * fbdiv as u64;
        if !(750_000_000..=1_600_000_000).contains(&vco) {
            continue;
        }
        for postdiv1 in (1u32..=7).rev() {
            for postdiv2 in 1u32..=postdiv1 {
                if vco == target_hz as u64 * (postdiv1 * postdiv2) as u64 {
                    return Some(PllParams {
                        fbdiv: fbdiv as u16,
                        postdiv1: postdiv1 as u8,
                        postdiv2: postdiv2 as u8,
                    });
                }
            }
        }
    }
    None
}

/// Current clock source mode
pub fn mode() -> ClockMode {
    ClockMode::from_code(CLOCK_MODE.load(Ordering::Relaxed))
}

/// Current target frequency in Hz
pub fn frequency_hz() -> u32 {
    CLOCK_FREQ_HZ.load(Ordering::Relaxed)
}

/// True once per resus event: the recovery hook fired since the last
/// call
pub fn take_resus_notice() -> bool {
    RESUS_NOTICE.swap(false, Ordering::Relaxed)
}

/// Park `clk_sys` on the glitchless reference mux and wait for the
/// switch to take effect
fn park_on_ref() {
    pac::CLOCKS
        .clk_sys_ctrl()
        .modify(|w| w.set_src(pac::clocks::vals::ClkSysCtrlSrc::CLK_REF));
    while pac::CLOCKS.clk_sys_selected().read() & 0x1 == 0 {}
}

/// Switch `clk_sys` to the given aux source
fn select_aux(auxsrc: pac::clocks::vals::ClkSysCtrlAuxsrc) {
    park_on_ref();
    pac::CLOCKS
        .clk_sys_ctrl()
        .modify(|w| w.set_auxsrc(auxsrc));
    pac::CLOCKS
        .clk_sys_ctrl()
        .modify(|w| w.set_src(pac::clocks::vals::ClkSysCtrlSrc::CLKSRC_CLK_SYS_AUX));
    while pac::CLOCKS.clk_sys_selected().read() & 0x2 == 0 {}
}

/// Reprogram PLL_SYS to `params` while `clk_sys` is parked on the
/// reference clock
fn program_pll(params: PllParams) {
    // Full reset so the sequence below always starts from power-on state
    pac::RESETS.reset().modify(|w| w.set_pll_sys(true));
    pac::RESETS.reset().modify(|w| w.set_pll_sys(false));
    while !pac::RESETS.reset_done().read().pll_sys() {}

    pac::PLL_SYS
        .fbdiv_int()
        .write(|w| w.set_fbdiv_int(params.fbdiv));

    // Power up VCO, wait for lock, then enable the post dividers
    pac::PLL_SYS.pwr().modify(|w| {
        w.set_pd(false);
        w.set_vcopd(false);
    });
    while !pac::PLL_SYS.cs().read().lock() {}

    pac::PLL_SYS.prim().write(|w| {
        w.set_postdiv1(params.postdiv1);
        w.set_postdiv2(params.postdiv2);
    });
    pac::PLL_SYS.pwr().modify(|w| w.set_postdivpd(false));
}

/// Keep the peripheral clock glued to `clk_sys` and re-time the
/// console UART after any `clk_sys` change
fn retime_peripherals() {
    pac::CLOCKS.clk_peri_ctrl().write(|w| {
        w.set_auxsrc(pac::clocks::vals::ClkPeriCtrlAuxsrc::CLK_SYS);
        w.set_enable(true);
    });
    refresh_console_baud();
}

/// Recompute the console UART baud divisors from the current clock.
///
/// Safe from interrupt context: three register writes, no locks.
fn refresh_console_baud() {
    let baud = CONSOLE_BAUD.load(Ordering::Relaxed);
    let clk_peri = CLOCK_FREQ_HZ.load(Ordering::Relaxed);

    // 16.6 fixed-point divisor, per the PL011 datasheet
    let divisor_x8 = (8 * clk_peri) / baud;
    let ibrd = (divisor_x8 >> 7).clamp(1, 0xFFFF);
    let fbrd = if ibrd == 0xFFFF {
        0
    } else {
        ((divisor_x8 & 0x7F) + 1) / 2
    };

    pac::UART0.uartibrd().write(|w| w.set_baud_divint(ibrd as u16));
    pac::UART0.uartfbrd().write(|w| w.set_baud_divfrac(fbrd as u8));
    // Dummy LCR_H write latches the new divisors
    pac::UART0.uartlcr_h().modify(|_| {});
}

/// Switch to the internal PLL at `freq_hz`.
///
/// Returns `false` (leaving the clock untouched) if no PLL setting
/// produces the frequency exactly.
pub fn set_internal(freq_hz: u32) -> bool {
    let Some(params) = pll_sys_params(freq_hz) else {
        return false;
    };

    park_on_ref();
    program_pll(params);
    select_aux(pac::clocks::vals::ClkSysCtrlAuxsrc::CLKSRC_PLL_SYS);

    // Detach the sync pin whenever we leave external mode
    pac::IO_BANK0
        .gpio(SYNC_GPIO as usize)
        .ctrl()
        .write(|w| w.set_funcsel(FUNCSEL_NULL));

    CLOCK_MODE.store(ClockMode::Internal as u8, Ordering::Relaxed);
    CLOCK_FREQ_HZ.store(freq_hz, Ordering::Relaxed);
    retime_peripherals();
    true
}

/// Lock `clk_sys` to the reference on the sync pin, expected at
/// `freq_hz`
pub fn set_external(freq_hz: u32) -> bool {
    if freq_hz == 0 {
        return false;
    }

    pac::IO_BANK0
        .gpio(SYNC_GPIO as usize)
        .ctrl()
        .write(|w| w.set_funcsel(FUNCSEL_GPIN));
    select_aux(pac::clocks::vals::ClkSysCtrlAuxsrc::CLKSRC_GPIN0);

    CLOCK_MODE.store(ClockMode::External as u8, Ordering::Relaxed);
    CLOCK_FREQ_HZ.store(freq_hz, Ordering::Relaxed);
    retime_peripherals();
    true
}

/// Reprogram the frequency of whichever source is active
pub fn set_frequency(freq_hz: u32) -> bool {
    match mode() {
        ClockMode::Internal => set_internal(freq_hz),
        ClockMode::External => set_external(freq_hz),
    }
}

/// Bring the clock tree to the power-on configuration and arm the
/// resus recovery path.
///
/// `console_baud` is remembered for baud refresh after every clock
/// change, including from the resus interrupt.
pub fn init(console_baud: u32) {
    CONSOLE_BAUD.store(console_baud, Ordering::Relaxed);
    set_internal(INTERNAL_DEFAULT_HZ);

    pac::CLOCKS
        .clk_sys_resus_ctrl()
        .modify(|w| w.set_enable(true));
    pac::CLOCKS.inte().modify(|w| w.set_clk_sys_resus(true));
}

/// The clock fault recovery hook.
///
/// Called from `CLOCKS_IRQ` after the resus unit has already forced
/// `clk_sys` onto the reference clock. Reverts to the internal
/// default, detaches the sync pin, re-times the console, and leaves a
/// notice for the control loop. Does not touch the lifecycle state or
/// the command buffer.
pub fn on_resus_irq() {
    set_internal(INTERNAL_DEFAULT_HZ);

    // Acknowledge the resus event; a fresh fault will re-trigger
    pac::CLOCKS
        .clk_sys_resus_ctrl()
        .modify(|w| w.set_clear(true));
    pac::CLOCKS
        .clk_sys_resus_ctrl()
        .modify(|w| w.set_clear(false));

    RESUS_NOTICE.store(true, Ordering::Relaxed);
}

/// Interrupt handler type for `bind_interrupts!`
pub struct ResusInterruptHandler;

impl Handler<CLOCKS_IRQ> for ResusInterruptHandler {
    unsafe fn on_interrupt() {
        on_resus_irq();
    }
}

/// Unmask `CLOCKS_IRQ`; the binding proves a handler is registered
pub fn enable_resus_irq<T: Binding<CLOCKS_IRQ, ResusInterruptHandler>>(_irqs: T) {
    use embassy_rp::interrupt::typelevel::Interrupt;
    CLOCKS_IRQ::unpend();
    unsafe { CLOCKS_IRQ::enable() };
}

/// Count one clock with the FC0 hardware frequency counter
fn frequency_count_khz(src: pac::clocks::vals::Fc0src) -> u32 {
    let clocks = pac::CLOCKS;

    while clocks.fc0_status().read().running() {}

    clocks
        .fc0_ref_khz()
        .write(|w| w.set_fc0_ref_khz(XOSC_HZ / 1000));
    clocks.fc0_interval().write(|w| w.set_fc0_interval(10));
    clocks.fc0_min_khz().write(|w| w.set_fc0_min_khz(0));
    clocks
        .fc0_max_khz()
        .write(|w| w.set_fc0_max_khz(0x1FF_FFFF));
    clocks.fc0_src().write(|w| w.set_fc0_src(src));

    while !clocks.fc0_status().read().done() {}
    clocks.fc0_result().read().khz()
}

/// Measure and print the standard set of clock frequencies (the `frq`
/// command)
pub fn measure_freqs<W: Write>(w: &mut W) -> fmt::Result {
    use pac::clocks::vals::Fc0src;

    let sources: [(&str, Fc0src); 8] = [
        ("pll_sys", Fc0src::PLL_SYS_CLKSRC_PRIMARY),
        ("pll_usb", Fc0src::PLL_USB_CLKSRC_PRIMARY),
        ("rosc", Fc0src::ROSC_CLKSRC),
        ("clk_sys", Fc0src::CLK_SYS),
        ("clk_peri", Fc0src::CLK_PERI),
        ("clk_usb", Fc0src::CLK_USB),
        ("clk_adc", Fc0src::CLK_ADC),
        ("clk_rtc", Fc0src::CLK_RTC),
    ];

    for (name, src) in sources {
        writeln!(w, "{} = {}kHz", name, frequency_count_khz(src))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pll_params_default() {
        // 100 MHz: VCO 1500 MHz (fbdiv 125), post dividers 5 and 3
        let params = pll_sys_params(100_000_000).unwrap();
        let vco = XOSC_HZ as u64 * params.fbdiv as u64;
        assert!((750_000_000..=1_600_000_000).contains(&vco));
        assert_eq!(
            vco,
            100_000_000u64 * (params.postdiv1 as u64 * params.postdiv2 as u64)
        );
    }

    #[test]
    fn test_pll_params_common_frequencies() {
        for hz in [125_000_000u32, 133_000_000, 48_000_000, 200_000_000] {
            let params = pll_sys_params(hz).unwrap();
            let vco = XOSC_HZ as u64 * params.fbdiv as u64;
            assert_eq!(vco, hz as u64 * (params.postdiv1 * params.postdiv2) as u64);
        }
    }

    #[test]
    fn test_pll_params_unsynthesizable() {
        assert_eq!(pll_sys_params(0), None);
        // Prime-ish frequency with no exact divider chain
        assert_eq!(pll_sys_params(99_999_999), None);
        // Far above the post-divided VCO range
        assert_eq!(pll_sys_params(2_000_000_000), None);
    }
}
