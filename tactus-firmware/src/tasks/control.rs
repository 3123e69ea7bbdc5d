//! Serial command interpreter task (core 0)
//!
//! One command line per loop iteration. Two gating tiers, checked
//! against a single status snapshot taken right after the line is
//! read:
//!
//! - always allowed: `ver`, `sts`, `deb`, `ndb`, `abt` (the abort is
//!   itself only effective while a run is in flight)
//! - idle only: everything that touches the command buffer, the
//!   output pins, or the clock
//!
//! A command issued outside its window is rejected with a message and
//! never queued or deferred.

use defmt::*;
use embassy_rp::gpio::Output;
use heapless::String;
use portable_atomic::Ordering;

use tactus_core::buffer::WordCheck;
use tactus_core::clock::INTERNAL_DEFAULT_HZ;
use tactus_core::engine::StartMode;
use tactus_core::state::{RunState, StatusCell};
use tactus_hal_rp2040::{clock, outputs};
use tactus_protocol::{
    write_current, write_pair, write_status, ClockCommand, Command, PairLine, ParseError,
};

use crate::board::{BUFFER_WORDS, LINE_LEN};
use crate::channels::{DEBUG, ENGINE_READY, SEQUENCE, START, STATUS};
use crate::console::Console;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[embassy_executor::task]
pub async fn control_task(mut console: Console, mut led: Output<'static>) {
    info!("control task started");

    // Wait for the engine core before accepting any command
    ENGINE_READY.receive().await;
    STATUS.set(RunState::Stopped);

    console.write_str("Tactus Digital Output online\n").await;
    led.set_low();

    let mut line_buf = [0u8; LINE_LEN];

    loop {
        if clock::take_resus_notice() {
            console.write_str("System Clock Resus'd\n").await;
        }

        console.write_str("> ").await;
        // LED on while waiting for input; the interpreter spends most
        // of its time here
        led.set_high();
        let line: String<LINE_LEN> = {
            let read = console.read_line(&mut line_buf).await;
            let mut owned = String::new();
            let _ = owned.push_str(read);
            owned
        };
        led.set_low();

        let state = STATUS.get();

        let cmd = match Command::parse(&line) {
            Ok(cmd) => cmd,
            Err(ParseError::BadArgument) => {
                console.write_str("invalid request\n").await;
                continue;
            }
            Err(_) => {
                console
                    .write_fmt(format_args!("Invalid command: {}\n", line))
                    .await;
                continue;
            }
        };

        match cmd {
            // Always allowed
            Command::Version => {
                console
                    .write_fmt(format_args!("Version: {}\n", VERSION))
                    .await;
            }
            Command::Status => {
                let mut out: String<64> = String::new();
                let _ = write_status(&mut out, state.code(), clock::mode().code());
                console.write_str(&out).await;
            }
            Command::DebugOn => DEBUG.store(true, Ordering::Relaxed),
            Command::DebugOff => DEBUG.store(false, Ordering::Relaxed),
            Command::Abort => {
                if state.abort_allowed() {
                    STATUS.set(RunState::AbortRequested);
                } else {
                    console
                        .write_str("Can only abort when status is 1 or 2\n")
                        .await;
                }
            }

            // Everything else requires the idle window
            cmd if cmd.requires_idle() && !state.is_idle() => {
                console
                    .write_fmt(format_args!(
                        "Cannot execute command {} during buffered execution.",
                        line
                    ))
                    .await;
            }

            Command::Clear => {
                // Idle window held: the engine is parked on the start
                // channel
                unsafe { SEQUENCE.get_mut() }.clear();
            }
            Command::Run => START.send(StartMode::HardwareTriggered).await,
            Command::SoftwareRun => START.send(StartMode::Immediate).await,
            Command::ManualWrite(value) => outputs::manual_write(value),
            Command::ReadOutputs => {
                console
                    .write_fmt(format_args!("{:x}\n", outputs::read_outputs()))
                    .await;
            }
            Command::AddMode => add_mode(&mut console, &mut line_buf).await,
            Command::Edit => edit_last(&mut console, &mut line_buf).await,
            Command::Dump => {
                let buffer = unsafe { SEQUENCE.get() };
                for pair in buffer.pairs() {
                    let mut out: String<64> = String::new();
                    let _ = write_pair(&mut out, pair);
                    console.write_str(&out).await;
                }
            }
            Command::Current => {
                let buffer = unsafe { SEQUENCE.get() };
                match buffer.current() {
                    Some(pair) => {
                        let mut out: String<64> = String::new();
                        let _ = write_current(&mut out, pair);
                        console.write_str(&out).await;
                    }
                    None => console.write_str("No commands in buffer\n").await,
                }
            }
            Command::Clock(clk) => clock_command(&mut console, clk).await,
            Command::MeasureFreqs => {
                let mut out: String<256> = String::new();
                if clock::measure_freqs(&mut out).is_ok() {
                    console.write_str(&out).await;
                }
            }
        }
    }
}

/// Append mode: read `<output-hex> <reps-hex>` lines until `end` or
/// buffer exhaustion.
///
/// Lines with fewer than two parsable hex fields are silently
/// re-prompted. Out-of-mask outputs are reported but stored anyway,
/// keeping later pairs positionally aligned.
async fn add_mode(console: &mut Console, line_buf: &mut [u8]) {
    let buffer = unsafe { SEQUENCE.get_mut() };

    loop {
        if buffer.is_full() {
            console
                .write_fmt(format_args!(
                    "Too many DO commands ({}). Please use resources more \
                     efficiently or increase the buffer capacity and recompile.\n",
                    BUFFER_WORDS
                ))
                .await;
            return;
        }

        // Retry on the same slot until a complete pair parses
        let (output, reps) = loop {
            let line = console.read_line(line_buf).await;
            match PairLine::parse(line) {
                PairLine::End => return,
                PairLine::Pair { output, reps } => break (output, reps),
                PairLine::Incomplete => {}
            }
        };

        if DEBUG.load(Ordering::Relaxed) {
            console
                .write_fmt(format_args!("Output: {:x}\n", output))
                .await;
            console
                .write_fmt(format_args!("Number of Reps: {}\n", reps))
                .await;
            if reps == 0 {
                console.write_str("Wait\n").await;
            }
        }

        match buffer.append(output, reps) {
            Ok(WordCheck::InMask) => {}
            Ok(WordCheck::OutOfMask) => {
                console
                    .write_fmt(format_args!("Invalid output specification {:x}\n", output))
                    .await;
            }
            // The margin check above makes this unreachable, but a
            // refused append must never lose the report
            Err(_) => {
                console
                    .write_fmt(format_args!(
                        "Too many DO commands ({}). Please use resources more \
                         efficiently or increase the buffer capacity and recompile.\n",
                        BUFFER_WORDS
                    ))
                    .await;
                return;
            }
        }
    }
}

/// Edit mode: read one pair and overwrite the last stored pair.
///
/// A no-op if the buffer is empty. Unlike append mode there is no
/// `end` escape; the loop runs until two hex fields parse.
async fn edit_last(console: &mut Console, line_buf: &mut [u8]) {
    let buffer = unsafe { SEQUENCE.get_mut() };
    if buffer.is_empty() {
        return;
    }

    let (output, reps) = loop {
        let line = console.read_line(line_buf).await;
        if let PairLine::Pair { output, reps } = PairLine::parse(line) {
            break (output, reps);
        }
    };

    // Emptiness was checked above; the mask check result is not
    // reported for edits
    let _ = buffer.edit_last(output, reps);
}

async fn clock_command(console: &mut Console, clk: ClockCommand) {
    let ok = match clk {
        ClockCommand::Internal => clock::set_internal(INTERNAL_DEFAULT_HZ),
        // The sync reference is expected at the calibrated default
        // until a `clk set` says otherwise
        ClockCommand::External => clock::set_external(INTERNAL_DEFAULT_HZ),
        ClockCommand::Set(hz) => clock::set_frequency(hz),
    };

    if !ok {
        console.write_str("invalid request\n").await;
    }
}
