//! Cross-core shared state
//!
//! The interpreter runs on core 0, the execution engine on core 1.
//! Everything they share lives here:
//!
//! - a capacity-1 start channel used as a rendezvous (at most one
//!   outstanding start request, matching the one-slot mailbox the
//!   protocol assumes)
//! - the lifecycle state behind a blocking mutex
//! - the debug flag
//! - the command buffer itself, in a cell whose access is gated by the
//!   lifecycle state rather than a lock

use core::cell::{Cell, UnsafeCell};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use portable_atomic::AtomicBool;

use tactus_core::buffer::CommandBuffer;
use tactus_core::engine::StartMode;
use tactus_core::state::{RunState, StatusCell};
use tactus_hal_rp2040::outputs::OUTPUT_MASK;

use crate::board::BUFFER_WORDS;

/// Start requests from the interpreter to the engine
pub static START: Channel<CriticalSectionRawMutex, StartMode, 1> = Channel::new();

/// One-shot engine readiness handshake, sent once at boot
pub static ENGINE_READY: Channel<CriticalSectionRawMutex, (), 1> = Channel::new();

/// Debug verbosity flag (`deb`/`ndb`)
pub static DEBUG: AtomicBool = AtomicBool::new(false);

/// The shared lifecycle state.
///
/// Both cores take snapshots and publish transitions through the
/// [`StatusCell`] trait; the lock is held only for the copy, never
/// across a poll.
pub struct SharedStatus {
    inner: BlockingMutex<CriticalSectionRawMutex, Cell<RunState>>,
}

impl SharedStatus {
    const fn new() -> Self {
        Self {
            inner: BlockingMutex::new(Cell::new(RunState::Stopped)),
        }
    }
}

impl StatusCell for SharedStatus {
    fn get(&self) -> RunState {
        self.inner.lock(|state| state.get())
    }

    fn set(&self, state: RunState) {
        self.inner.lock(|cell| cell.set(state));
    }
}

pub static STATUS: SharedStatus = SharedStatus::new();

/// The command buffer, shared between cores without a lock.
///
/// A mutex is deliberately not used here: the engine streams the
/// buffer by DMA for the whole duration of a run and could not hold a
/// lock across it. Exclusion comes from the lifecycle state instead,
/// which both accessors must respect (see safety contracts below).
pub struct SequenceCell {
    inner: UnsafeCell<CommandBuffer<BUFFER_WORDS>>,
}

// Access is gated by the lifecycle state, enforced at the two call
// sites rather than by the type system
unsafe impl Sync for SequenceCell {}

impl SequenceCell {
    /// Shared access for reading or streaming the stored program.
    ///
    /// # Safety
    /// No `get_mut` reference may be live. The interpreter only
    /// mutates in the idle window and the engine only reads outside
    /// it, so callers on either side satisfy this by checking the
    /// lifecycle state first.
    pub unsafe fn get(&self) -> &CommandBuffer<BUFFER_WORDS> {
        &*self.inner.get()
    }

    /// Exclusive access for mutation.
    ///
    /// # Safety
    /// Only the interpreter may call this, and only while the
    /// lifecycle state is in the idle window (`Stopped`/`Aborted`),
    /// which guarantees the engine is parked on the start channel.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut CommandBuffer<BUFFER_WORDS> {
        &mut *self.inner.get()
    }
}

pub static SEQUENCE: SequenceCell = SequenceCell {
    inner: UnsafeCell::new(CommandBuffer::new(OUTPUT_MASK)),
};
