//! Standup core library: domain types, record codec, reaction aggregation,
//! speaker queue and local persisted state.
//!
//! Nothing in this crate touches the network:
//! - [`types`]: newtypes and domain structs
//! - [`codec`]: line-oriented `KEY=value` record bodies
//! - [`reactions`]: team-wide reaction totals
//! - [`speaker`]: facilitator-owned speaker queue
//! - [`config`]: [`StandupConfig`]
//! - [`local`]: config, passphrase cache and speaker snapshots under `~/.standup/`
//! - [`error`]: [`LocalStateError`]

pub mod codec;
pub mod config;
pub mod error;
pub mod local;
pub mod reactions;
pub mod speaker;
pub mod types;

pub use config::StandupConfig;
pub use error::LocalStateError;
pub use reactions::{aggregate, ReactionTotals};
pub use speaker::SpeakerQueue;
pub use types::{
    passphrase_hash, ReactionState, RecordKey, SessionId, StatusRecord, TeamName,
    TeamRegistryEntry, WriterName,
};
