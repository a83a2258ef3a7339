//! Async runtime around the sync engine: the polling loop with guaranteed
//! rescheduling, debounced reaction writes and the watch console.

pub mod console;
pub mod debounce;
mod error;
pub mod runtime;
pub mod session;

pub use debounce::{ReactionDebouncer, DEBOUNCE_WINDOW};
pub use error::DaemonError;
pub use runtime::{
    channels, init_tracing, run, CycleReport, CycleStatus, DaemonHandle, LoopInbox,
};
pub use session::{start_blocking, watch, Session};
