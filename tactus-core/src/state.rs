//! Execution lifecycle state
//!
//! Exactly one instance of [`RunState`] exists per device, shared
//! between the control context and the execution context behind a
//! mutual-exclusion lock. All access is snapshot-style: take a copy
//! under the lock, release, then act on the copy - the monitoring
//! loop must never spin while holding the lock.
//!
//! Write ownership is split by context: the control context writes
//! only `AbortRequested` (and only from `Running` or
//! `TransitionToRunning`); the execution context writes every other
//! transition.

/// Lifecycle state of the output pipeline.
///
/// Discriminants are the wire codes reported by the status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RunState {
    /// No run in progress; buffer and clock may be mutated
    Stopped = 0,
    /// Start request accepted, pipeline being armed
    TransitionToRunning = 1,
    /// Pipeline executing autonomously
    Running = 2,
    /// Abort requested by the control context, not yet observed
    AbortRequested = 3,
    /// Execution context tearing the pipeline down after an abort
    Aborting = 4,
    /// Run ended by abort; buffer and clock may be mutated
    Aborted = 5,
    /// Execution context tearing the pipeline down after completion
    TransitionToStop = 6,
}

impl RunState {
    /// Numeric code for the status report
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True in the idle window where buffered commands, manual pin
    /// access, and clock changes are legal
    pub fn is_idle(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Aborted)
    }

    /// True if an abort request is accepted in this state
    pub fn abort_allowed(self) -> bool {
        matches!(self, RunState::Running | RunState::TransitionToRunning)
    }
}

/// Shared, lock-protected access to the one [`RunState`] instance.
///
/// Implementations wrap the platform lock (a blocking mutex in
/// firmware, a plain cell in host tests). `get` returns a snapshot;
/// neither method may block while the lock is held.
pub trait StatusCell {
    /// Snapshot the current state
    fn get(&self) -> RunState;
    /// Publish a new state
    fn set(&self, state: RunState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RunState::Stopped.code(), 0);
        assert_eq!(RunState::TransitionToRunning.code(), 1);
        assert_eq!(RunState::Running.code(), 2);
        assert_eq!(RunState::AbortRequested.code(), 3);
        assert_eq!(RunState::Aborting.code(), 4);
        assert_eq!(RunState::Aborted.code(), 5);
        assert_eq!(RunState::TransitionToStop.code(), 6);
    }

    #[test]
    fn test_idle_window() {
        assert!(RunState::Stopped.is_idle());
        assert!(RunState::Aborted.is_idle());

        for state in [
            RunState::TransitionToRunning,
            RunState::Running,
            RunState::AbortRequested,
            RunState::Aborting,
            RunState::TransitionToStop,
        ] {
            assert!(!state.is_idle());
        }
    }

    #[test]
    fn test_abort_window() {
        assert!(RunState::Running.abort_allowed());
        assert!(RunState::TransitionToRunning.abort_allowed());

        for state in [
            RunState::Stopped,
            RunState::AbortRequested,
            RunState::Aborting,
            RunState::Aborted,
            RunState::TransitionToStop,
        ] {
            assert!(!state.abort_allowed());
        }
    }
}
