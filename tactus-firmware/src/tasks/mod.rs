//! Embassy async tasks
//!
//! One task per core: the command interpreter on core 0 and the
//! execution engine on core 1, communicating through `channels`.

pub mod control;
pub mod engine;

pub use control::control_task;
pub use engine::engine_task;
