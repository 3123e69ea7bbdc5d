//! Arm/monitor/teardown execution cycle
//!
//! One cycle takes the shared lifecycle state from an idle state
//! through `Running` to a terminal `Stopped` or `Aborted`, driving
//! the output pipeline through the hardware seam defined by
//! [`Pipeline`]. The execution context runs this once per received
//! start request.
//!
//! The completion/abort poll is a deliberate non-yielding spin: both
//! the pipeline's end-of-program flag and an abort request must be
//! observed with minimal latency, so no blocking primitive is used
//! there. The poll holds no lock - state reads are snapshots.

use crate::state::{RunState, StatusCell};

/// How a run begins once armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartMode {
    /// Start executing as soon as the pipeline is enabled
    Immediate,
    /// Wait for the external hardware trigger before the first output
    HardwareTriggered,
}

impl StartMode {
    /// The first word pushed into the pipeline, which selects whether
    /// it waits for the trigger input
    pub fn first_word(self) -> u32 {
        match self {
            StartMode::Immediate => 0,
            StartMode::HardwareTriggered => 1,
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Pipeline raised its end-of-program signal
    Completed,
    /// An abort request was observed before completion
    Aborted,
}

/// The output pipeline's start/stop/trigger contract.
///
/// Implemented by the PIO/DMA driver in the HAL; host tests use a
/// scripted mock. The pipeline runs autonomously between `arm` and
/// `teardown` - nothing here blocks.
pub trait Pipeline {
    /// Reset the pipeline and start it on `words`.
    ///
    /// Order-sensitive: the pipeline must be stopped and its queues
    /// drained before reconfiguration, or stale words from a previous
    /// run leak into this one. The start mode is delivered ahead of
    /// the program stream.
    fn arm(&mut self, start: StartMode, words: &[u32]);

    /// True once the pipeline has raised its end-of-program signal
    fn done(&self) -> bool;

    /// Clear the end-of-program signal (idempotent)
    fn clear_done(&mut self);

    /// Stop the pipeline: cancel the in-flight stream, disable
    /// execution, drain queues. Safe after both completion and abort.
    fn teardown(&mut self);
}

/// Run one execution cycle.
///
/// Publishes `Running` only after the pipeline is armed, so the other
/// context can rely on the buffer being consumed once `Running` is
/// visible. The terminal state is `Stopped` after natural completion
/// and `Aborted` after an observed abort request - never the other
/// way around.
///
/// A pipeline that never completes and is never aborted spins here
/// forever; there is no watchdog.
pub fn run_cycle<P, S>(pipeline: &mut P, status: &S, start: StartMode, words: &[u32]) -> CycleOutcome
where
    P: Pipeline,
    S: StatusCell,
{
    status.set(RunState::TransitionToRunning);
    pipeline.arm(start, words);
    status.set(RunState::Running);

    // Tight loop: exits when the pipeline signals end-of-program or
    // the control context has requested an abort
    while !pipeline.done() && status.get() != RunState::AbortRequested {}

    // The signal may or may not have fired on the abort path; clearing
    // is idempotent
    pipeline.clear_done();

    if status.get() == RunState::AbortRequested {
        status.set(RunState::Aborting);
        pipeline.teardown();
        status.set(RunState::Aborted);
        CycleOutcome::Aborted
    } else {
        status.set(RunState::TransitionToStop);
        pipeline.teardown();
        status.set(RunState::Stopped);
        CycleOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        Set(RunState),
        Arm,
        ClearDone,
        Teardown,
    }

    type Log = RefCell<Vec<Ev, 16>>;

    struct MockPipeline<'a> {
        log: &'a Log,
        /// Polls of `done` before the end-of-program flag raises;
        /// `None` means it never raises (abort is the only exit)
        done_after: Option<usize>,
        polls: Cell<usize>,
        armed_words: Cell<usize>,
        armed_start: Cell<Option<StartMode>>,
    }

    impl<'a> MockPipeline<'a> {
        fn new(log: &'a Log, done_after: Option<usize>) -> Self {
            Self {
                log,
                done_after,
                polls: Cell::new(0),
                armed_words: Cell::new(0),
                armed_start: Cell::new(None),
            }
        }
    }

    impl Pipeline for MockPipeline<'_> {
        fn arm(&mut self, start: StartMode, words: &[u32]) {
            self.armed_start.set(Some(start));
            self.armed_words.set(words.len());
            self.log.borrow_mut().push(Ev::Arm).unwrap();
        }

        fn done(&self) -> bool {
            let n = self.polls.get() + 1;
            self.polls.set(n);
            match self.done_after {
                Some(limit) => n > limit,
                None => false,
            }
        }

        fn clear_done(&mut self) {
            self.log.borrow_mut().push(Ev::ClearDone).unwrap();
        }

        fn teardown(&mut self) {
            self.log.borrow_mut().push(Ev::Teardown).unwrap();
        }
    }

    /// Status cell that can impersonate the control context by
    /// flipping to `AbortRequested` after a number of snapshots
    struct MockStatus<'a> {
        log: &'a Log,
        state: Cell<RunState>,
        abort_after_gets: Cell<Option<usize>>,
    }

    impl<'a> MockStatus<'a> {
        fn new(log: &'a Log, abort_after_gets: Option<usize>) -> Self {
            Self {
                log,
                state: Cell::new(RunState::Stopped),
                abort_after_gets: Cell::new(abort_after_gets),
            }
        }
    }

    impl StatusCell for MockStatus<'_> {
        fn get(&self) -> RunState {
            if let Some(remaining) = self.abort_after_gets.get() {
                if remaining == 0 && self.state.get().abort_allowed() {
                    self.state.set(RunState::AbortRequested);
                    self.abort_after_gets.set(None);
                } else if remaining > 0 {
                    self.abort_after_gets.set(Some(remaining - 1));
                }
            }
            self.state.get()
        }

        fn set(&self, state: RunState) {
            self.state.set(state);
            self.log.borrow_mut().push(Ev::Set(state)).unwrap();
        }
    }

    #[test]
    fn test_natural_completion_reaches_stopped() {
        let log = Log::new(Vec::new());
        let mut pipeline = MockPipeline::new(&log, Some(3));
        let status = MockStatus::new(&log, None);

        let outcome = run_cycle(&mut pipeline, &status, StartMode::Immediate, &[1, 6, 2, 0]);

        assert_eq!(outcome, CycleOutcome::Completed);
        assert_eq!(status.state.get(), RunState::Stopped);
        assert_eq!(pipeline.armed_words.get(), 4);
        assert_eq!(pipeline.armed_start.get(), Some(StartMode::Immediate));
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Ev::Set(RunState::TransitionToRunning),
                Ev::Arm,
                Ev::Set(RunState::Running),
                Ev::ClearDone,
                Ev::Set(RunState::TransitionToStop),
                Ev::Teardown,
                Ev::Set(RunState::Stopped),
            ]
        );
    }

    #[test]
    fn test_abort_reaches_aborted_never_stopped() {
        let log = Log::new(Vec::new());
        // Pipeline never completes on its own
        let mut pipeline = MockPipeline::new(&log, None);
        let status = MockStatus::new(&log, Some(5));

        let outcome = run_cycle(&mut pipeline, &status, StartMode::HardwareTriggered, &[1, 6]);

        assert_eq!(outcome, CycleOutcome::Aborted);
        assert_eq!(status.state.get(), RunState::Aborted);
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Ev::Set(RunState::TransitionToRunning),
                Ev::Arm,
                Ev::Set(RunState::Running),
                Ev::ClearDone,
                Ev::Set(RunState::Aborting),
                Ev::Teardown,
                Ev::Set(RunState::Aborted),
            ]
        );
    }

    #[test]
    fn test_immediate_abort_request_wins() {
        let log = Log::new(Vec::new());
        // Completion and abort racing: abort is visible on the very
        // first snapshot, completion would need two polls
        let mut pipeline = MockPipeline::new(&log, Some(2));
        let status = MockStatus::new(&log, Some(0));

        let outcome = run_cycle(&mut pipeline, &status, StartMode::Immediate, &[1, 0]);

        assert_eq!(outcome, CycleOutcome::Aborted);
        assert_eq!(status.state.get(), RunState::Aborted);
    }

    #[test]
    fn test_completion_signal_cleared_on_abort_path() {
        let log = Log::new(Vec::new());
        let mut pipeline = MockPipeline::new(&log, None);
        let status = MockStatus::new(&log, Some(0));

        run_cycle(&mut pipeline, &status, StartMode::Immediate, &[]);

        // clear_done runs unconditionally, before the terminal split
        let log = log.borrow();
        let clear_pos = log.iter().position(|e| *e == Ev::ClearDone).unwrap();
        let teardown_pos = log.iter().position(|e| *e == Ev::Teardown).unwrap();
        assert!(clear_pos < teardown_pos);
    }

    #[test]
    fn test_start_mode_first_word() {
        assert_eq!(StartMode::Immediate.first_word(), 0);
        assert_eq!(StartMode::HardwareTriggered.first_word(), 1);
    }
}
