//! Buffered execution engine task (core 1)
//!
//! The sole task on core 1. Parks on the start channel between runs
//! and drives one arm/monitor/teardown cycle per start request. The
//! monitoring inside `run_cycle` is a tight non-yielding poll, which
//! is why this task gets a core to itself.

use defmt::*;
use portable_atomic::Ordering;

use tactus_core::engine::{run_cycle, CycleOutcome};
use tactus_hal_rp2040::sequencer::PioSequencer;

use crate::channels::{DEBUG, ENGINE_READY, SEQUENCE, START, STATUS};

#[embassy_executor::task]
pub async fn engine_task(mut pipeline: PioSequencer<'static>) {
    info!("engine task started on core 1");

    // Signal readiness; the interpreter does not accept commands
    // before this
    ENGINE_READY.send(()).await;

    loop {
        let start = START.receive().await;

        if DEBUG.load(Ordering::Relaxed) {
            debug!("hwstart: {}", start.first_word());
        }

        // The interpreter mutates the buffer only in the idle window,
        // and it leaves that window with this cycle's first state
        // transition
        let words = unsafe { SEQUENCE.get() }.words();
        let outcome = run_cycle(&mut pipeline, &STATUS, start, words);

        if DEBUG.load(Ordering::Relaxed) {
            match outcome {
                CycleOutcome::Completed => debug!("execution stopped"),
                CycleOutcome::Aborted => debug!("aborted execution"),
            }
        }
    }
}
