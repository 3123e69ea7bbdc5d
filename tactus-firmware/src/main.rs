//! Tactus - Hardware-timed digital output sequencer
//!
//! Main firmware binary for RP2040-based boards. Core 0 runs the
//! serial command interpreter; core 1 runs the execution engine that
//! arms and monitors the PIO/DMA output pipeline.
//!
//! Named after the Latin "tactus", the conductor's beat in mensural
//! music - the steady hand that keeps every output change on time.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{Executor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use tactus_hal_rp2040::clock::{self, ResusInterruptHandler};
use tactus_hal_rp2040::sequencer::PioSequencer;

use crate::console::Console;

mod board;
mod channels;
mod console;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    CLOCKS_IRQ => ResusInterruptHandler;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// Core 1 gets its own stack and executor for the engine task
static mut CORE1_STACK: Stack<4096> = Stack::new();
static CORE1_EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Main entry point (core 0)
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Tactus firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Setup the console UART before reprogramming the clock; the
    // clock module re-times it after every clk_sys change
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = board::CONSOLE_BAUD;

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_28, p.PIN_29, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    let console = Console::new(tx, rx);

    info!("Console UART initialized");

    // Timing base: calibrated 100 MHz default, resus armed so a dead
    // external reference cannot brick the console
    clock::init(board::CONSOLE_BAUD);
    clock::enable_resus_irq(Irqs);

    info!("System clock at {} Hz, resus armed", clock::frequency_hz());

    // Onboard LED on while starting up; the interpreter drives it
    // afterwards
    let led = Output::new(p.PIN_25, Level::High);

    // Setup PIO0 for the output pipeline: GPIO 0-15 outputs, GPIO 16
    // trigger input
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);

    let out_pins = [
        common.make_pio_pin(p.PIN_0),
        common.make_pio_pin(p.PIN_1),
        common.make_pio_pin(p.PIN_2),
        common.make_pio_pin(p.PIN_3),
        common.make_pio_pin(p.PIN_4),
        common.make_pio_pin(p.PIN_5),
        common.make_pio_pin(p.PIN_6),
        common.make_pio_pin(p.PIN_7),
        common.make_pio_pin(p.PIN_8),
        common.make_pio_pin(p.PIN_9),
        common.make_pio_pin(p.PIN_10),
        common.make_pio_pin(p.PIN_11),
        common.make_pio_pin(p.PIN_12),
        common.make_pio_pin(p.PIN_13),
        common.make_pio_pin(p.PIN_14),
        common.make_pio_pin(p.PIN_15),
    ];
    let trigger_pin = common.make_pio_pin(p.PIN_16);

    let sequencer = PioSequencer::new(&mut common, sm0, out_pins, trigger_pin, p.DMA_CH0);

    info!("PIO output pipeline initialized");

    // The engine runs alone on core 1: its run-monitoring loop is a
    // deliberate non-yielding spin
    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor = CORE1_EXECUTOR.init(Executor::new());
            executor.run(|spawner| spawner.spawn(tasks::engine_task(sequencer)).unwrap())
        },
    );

    spawner.spawn(tasks::control_task(console, led)).unwrap();

    info!("All tasks spawned, firmware running");

    // All work happens in the spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
