//! # standup-sync
//!
//! Store access, optimistic writes and the polling sync engine.
//!
//! Build one [`CachedStore`] around an [`ObjectStore`] ([`HttpObjectStore`] in
//! production, [`MemoryStore`] in tests), share it by `Arc` between a
//! [`SyncEngine`] and a [`WriteCoordinator`], and call
//! [`SyncEngine::run_cycle`] on a timer.

pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod http;
pub mod layout;
pub mod memory;
pub mod store;
pub mod teams;

pub use cache::{CachedEntry, EtagCache};
pub use coordinator::{ReactionChange, UpsertOutcome, WriteCoordinator};
pub use engine::{CycleOutcome, EngineConfig, LockReason, Snapshot, SyncEngine};
pub use error::SyncError;
pub use http::{HttpObjectStore, HttpStoreConfig};
pub use memory::{Fault, MemoryStore};
pub use store::{CachedStore, ListedObject, ObjectStore, ReadOutcome, RemoteObject};
