//! Optimistic writes against the object store.
//!
//! Every mutation is read → mutate → compare-and-swap write. A version
//! conflict is retried exactly once against freshly fetched content; a second
//! conflict is returned to the caller.

use std::sync::Arc;

use chrono::Utc;

use standup_core::codec::{decode_record_at, encode_record};
use standup_core::types::MAX_RATING;
use standup_core::{RecordKey, StatusRecord, TeamName, TeamRegistryEntry, WriterName};

use crate::error::SyncError;
use crate::layout::record_path;
use crate::store::{CachedStore, ObjectStore};
use crate::teams;

/// Result of a successful [`WriteCoordinator::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Version tag of the object as written.
    pub version: String,
    /// 1 on a clean write, 2 if the first attempt hit a conflict.
    pub attempts: u32,
    /// The object did not exist before this write.
    pub created: bool,
}

/// One reaction flag to set or clear on the owner's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionChange {
    /// Display form of the target record's key.
    pub target: String,
    pub emoji: String,
    pub on: bool,
}

impl ReactionChange {
    pub fn new(target: &RecordKey, emoji: impl Into<String>, on: bool) -> Self {
        Self {
            target: target.to_string(),
            emoji: emoji.into(),
            on,
        }
    }
}

pub struct WriteCoordinator<S> {
    store: Arc<CachedStore<S>>,
    data_dir: String,
}

impl<S> Clone for WriteCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            data_dir: self.data_dir.clone(),
        }
    }
}

impl<S: ObjectStore> WriteCoordinator<S> {
    pub fn new(store: Arc<CachedStore<S>>, data_dir: impl Into<String>) -> Self {
        Self {
            store,
            data_dir: data_dir.into(),
        }
    }

    pub fn store(&self) -> &Arc<CachedStore<S>> {
        &self.store
    }

    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    /// Read-modify-write `path` with a single retry on version conflict.
    ///
    /// `mutate` receives the current body (`None` when the object is absent)
    /// and returns the body to write. It runs again on retry, against the
    /// refreshed body, so it must not carry state between calls.
    pub fn upsert<F>(&self, path: &str, message: &str, mut mutate: F) -> Result<UpsertOutcome, SyncError>
    where
        F: FnMut(Option<&str>) -> String,
    {
        let current = self.store.fetch(path)?;
        let expected = current.as_ref().map(|e| e.version.clone());
        let body = mutate(current.as_ref().map(|e| e.body.as_str()));

        match self.store.write(path, &body, expected.as_deref(), message) {
            Ok(version) => {
                return Ok(UpsertOutcome {
                    version,
                    attempts: 1,
                    created: expected.is_none(),
                })
            }
            Err(err) if err.is_conflict() => {
                tracing::info!("{path}: version conflict, retrying once against fresh content");
            }
            Err(err) => return Err(err),
        }

        let fresh = self.store.fetch_fresh(path)?;
        let expected = fresh.as_ref().map(|e| e.version.clone());
        let body = mutate(fresh.as_ref().map(|e| e.body.as_str()));
        let version = self.store.write(path, &body, expected.as_deref(), message)?;
        Ok(UpsertOutcome {
            version,
            attempts: 2,
            created: expected.is_none(),
        })
    }

    // -----------------------------------------------------------------------
    // Status records
    // -----------------------------------------------------------------------

    /// Write the owner's status, keeping whatever reaction flags the remote
    /// copy already carries.
    pub fn save_status(
        &self,
        key: &RecordKey,
        feeling: Option<u8>,
        productivity: Option<u8>,
        update: &str,
    ) -> Result<UpsertOutcome, SyncError> {
        for (label, value) in [("feeling", feeling), ("productivity", productivity)] {
            if let Some(v) = value.filter(|v| *v > MAX_RATING) {
                return Err(SyncError::Invalid(format!(
                    "{label} must be between 0 and {MAX_RATING}, got {v}"
                )));
            }
        }
        let path = record_path(&self.data_dir, key);
        let now = Utc::now();
        let outcome = self.upsert(&path, &format!("standup: update {key}"), |current| {
            let mut record = current_record(key, current);
            record.feeling = feeling;
            record.productivity = productivity;
            record.update = update.to_string();
            record.updated_at = Some(now);
            encode_record(&record)
        })?;
        tracing::info!("saved status for {key} (attempts: {})", outcome.attempts);
        Ok(outcome)
    }

    /// Fetch one record through the cache.
    pub fn load_record(&self, key: &RecordKey) -> Result<Option<StatusRecord>, SyncError> {
        self.store
            .fetch_record(&record_path(&self.data_dir, key), key)
    }

    /// Last known copy of a record: whatever the most recent read or
    /// successful write left in the cache.
    pub fn cached_record(&self, key: &RecordKey) -> Option<StatusRecord> {
        self.store
            .cached_record(&record_path(&self.data_dir, key), key)
    }

    /// Delete a record after checking the team passphrase.
    pub fn delete_record(&self, key: &RecordKey, passphrase: Option<&str>) -> Result<(), SyncError> {
        self.verify_passphrase(&key.team, passphrase)?;
        let path = record_path(&self.data_dir, key);
        let Some(current) = self.store.fetch_fresh(&path)? else {
            return Err(SyncError::NotFound { path });
        };
        self.store
            .delete(&path, &current.version, &format!("standup: delete {key}"))?;
        tracing::info!("deleted {key}");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reactions
    // -----------------------------------------------------------------------

    /// Apply a batch of reaction flags to `owner`'s record.
    ///
    /// Changes use set/clear semantics so re-applying them on retry is
    /// idempotent. The state version always advances.
    pub fn apply_reactions(
        &self,
        owner: &RecordKey,
        changes: &[ReactionChange],
    ) -> Result<UpsertOutcome, SyncError> {
        let path = record_path(&self.data_dir, owner);
        let now = Utc::now();
        let outcome = self.upsert(&path, &format!("standup: reactions from {owner}"), |current| {
            let mut record = current_record(owner, current);
            for change in changes {
                record.reactions.set(&change.target, &change.emoji, change.on);
            }
            record.reactions.touch(now);
            encode_record(&record)
        })?;
        tracing::debug!(
            "applied {} reaction change(s) for {owner} (attempts: {})",
            changes.len(),
            outcome.attempts
        );
        Ok(outcome)
    }

    /// Flip one flag. The desired value is decided from the record as read
    /// now, so a conflict retry cannot flip it back. Returns the new value.
    pub fn toggle_reaction(
        &self,
        owner: &RecordKey,
        target: &RecordKey,
        emoji: &str,
    ) -> Result<bool, SyncError> {
        let target_key = target.to_string();
        let on = !self
            .load_record(owner)?
            .map(|record| record.reactions.is_set(&target_key, emoji))
            .unwrap_or(false);
        self.apply_reactions(owner, &[ReactionChange::new(target, emoji, on)])?;
        Ok(on)
    }

    // -----------------------------------------------------------------------
    // Team registry
    // -----------------------------------------------------------------------

    pub fn create_team(
        &self,
        team: &TeamName,
        passphrase: Option<&str>,
        creator: &WriterName,
    ) -> Result<TeamRegistryEntry, SyncError> {
        teams::create_team(&self.store, &self.data_dir, team, passphrase, creator)
    }

    pub fn load_team(&self, team: &TeamName) -> Result<Option<TeamRegistryEntry>, SyncError> {
        teams::load_team(&self.store, &self.data_dir, team)
    }

    /// `Ok(())` if the team is open, unregistered, or `candidate` matches.
    pub fn verify_passphrase(&self, team: &TeamName, candidate: Option<&str>) -> Result<(), SyncError> {
        let entry = self.load_team(team)?;
        teams::check_passphrase(entry.as_ref(), candidate)
    }
}

fn current_record(key: &RecordKey, body: Option<&str>) -> StatusRecord {
    match body {
        Some(body) => {
            let mut record = decode_record_at(key, body);
            // The path decides identity, not the body.
            record.team = key.team.clone();
            record.writer = key.writer.clone();
            record.session = key.session.clone();
            record
        }
        None => StatusRecord::empty(key),
    }
}
