//! Sync engine: one non-reentrant poll cycle over the store.
//!
//! A cycle lists the data and registry directories, derives the team roster,
//! checks the passphrase gate for the active team, fetches the active
//! session's records through the ETag cache, aggregates reactions and
//! publishes a [`Snapshot`]. Rate limiting grows a backoff that is added to
//! the poll interval; any completed cycle clears it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use standup_core::{
    aggregate, ReactionTotals, SessionId, StandupConfig, StatusRecord, TeamName, WriterName,
};

use crate::error::SyncError;
use crate::layout::{key_from_file_name, team_path, teams_dir, RECORD_SUFFIX, TEAM_SUFFIX};
use crate::store::{CachedStore, ObjectStore};
use crate::teams;

/// Engine settings, usually derived from [`StandupConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: String,
    pub team: TeamName,
    /// Fixed session. `None` follows the UTC date, re-read every cycle.
    pub session: Option<SessionId>,
    pub poll_interval: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
}

impl EngineConfig {
    pub fn from_config(config: &StandupConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            team: config.team.clone(),
            session: config.session.clone(),
            poll_interval: config.poll_interval(),
            backoff_floor: config.backoff_floor(),
            backoff_ceiling: config.backoff_ceiling(),
        }
    }

    /// The session a cycle starting at `now` polls.
    pub fn session_at(&self, now: DateTime<Utc>) -> SessionId {
        self.session
            .clone()
            .unwrap_or_else(|| SessionId::for_date(now))
    }
}

/// Published result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub team: TeamName,
    pub session: SessionId,
    /// Every known team, sorted.
    pub teams: Vec<TeamName>,
    /// Records of the active team and session, sorted by writer.
    pub records: Vec<StatusRecord>,
    pub totals: ReactionTotals,
    pub writers: Vec<WriterName>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn record_for(&self, writer: &WriterName) -> Option<&StatusRecord> {
        self.records.iter().find(|r| &r.writer == writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    PassphraseRequired,
    PassphraseMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already in flight.
    Skipped,
    /// The active team is protected and the known passphrase does not open it.
    /// Nothing beyond the roster was fetched.
    Locked { team: TeamName, reason: LockReason },
    Published(Snapshot),
}

#[derive(Debug, Default)]
struct EngineState {
    backoff: Duration,
    passphrase: Option<String>,
    teams: Vec<TeamName>,
    latest: Option<Snapshot>,
}

pub struct SyncEngine<S> {
    store: Arc<CachedStore<S>>,
    config: EngineConfig,
    syncing: AtomicBool,
    state: Mutex<EngineState>,
}

/// Holds the `syncing` flag for the duration of a cycle.
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard(flag))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: ObjectStore> SyncEngine<S> {
    pub fn new(store: Arc<CachedStore<S>>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            syncing: AtomicBool::new(false),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn store(&self) -> &Arc<CachedStore<S>> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_passphrase(&self, passphrase: Option<String>) {
        self.state().passphrase = passphrase;
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn backoff(&self) -> Duration {
        self.state().backoff
    }

    /// Poll interval plus the current backoff.
    pub fn next_delay(&self) -> Duration {
        self.config.poll_interval + self.backoff()
    }

    /// Last published snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.state().latest.clone()
    }

    /// Team roster as of the last cycle that got that far.
    pub fn teams(&self) -> Vec<TeamName> {
        self.state().teams.clone()
    }

    /// Run one cycle unless one is already running.
    pub fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            tracing::debug!("sync already in flight; skipping");
            return Ok(CycleOutcome::Skipped);
        };
        let result = self.cycle();
        self.settle_backoff(&result);
        result
    }

    fn cycle(&self) -> Result<CycleOutcome, SyncError> {
        let data_dir = &self.config.data_dir;
        let team = &self.config.team;
        let session = self.config.session_at(Utc::now());

        // Roster.
        let data = self.store.list(data_dir, RECORD_SUFFIX)?;
        let registry = self.store.list(&teams_dir(data_dir), TEAM_SUFFIX)?;
        let roster = teams::roster(&registry, &data);
        self.state().teams = roster.clone();

        // Passphrase gate.
        let registry_path = team_path(data_dir, team);
        if registry.iter().any(|obj| obj.path == registry_path) {
            let entry = teams::load_team(&self.store, data_dir, team)?;
            let passphrase = self.state().passphrase.clone();
            match teams::check_passphrase(entry.as_ref(), passphrase.as_deref()) {
                Ok(()) => {}
                Err(SyncError::PassphraseRequired { .. }) => {
                    return Ok(self.locked(LockReason::PassphraseRequired))
                }
                Err(SyncError::PassphraseMismatch { .. }) => {
                    return Ok(self.locked(LockReason::PassphraseMismatch))
                }
                Err(err) => return Err(err),
            }
        }

        // Records.
        let mut records = Vec::new();
        for obj in &data {
            let Some(key) = key_from_file_name(&obj.name) else {
                continue;
            };
            if &key.team != team || key.session != session {
                continue;
            }
            match self.store.fetch_record(&obj.path, &key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => tracing::debug!("{key} vanished between list and read"),
                Err(err) if err.is_rate_limited() => return Err(err),
                Err(err) => tracing::warn!("skipping {key}: {err}"),
            }
        }
        records.sort_by(|a, b| a.writer.cmp(&b.writer));

        let snapshot = Snapshot {
            team: team.clone(),
            session,
            teams: roster,
            totals: aggregate(&records),
            writers: records.iter().map(|r| r.writer.clone()).collect(),
            records,
            fetched_at: Utc::now(),
        };
        self.state().latest = Some(snapshot.clone());
        Ok(CycleOutcome::Published(snapshot))
    }

    fn locked(&self, reason: LockReason) -> CycleOutcome {
        tracing::info!("team {} is locked ({reason:?})", self.config.team);
        CycleOutcome::Locked {
            team: self.config.team.clone(),
            reason,
        }
    }

    fn settle_backoff(&self, result: &Result<CycleOutcome, SyncError>) {
        let mut state = self.state();
        match result {
            Ok(CycleOutcome::Skipped) => {}
            Ok(_) => state.backoff = Duration::ZERO,
            Err(SyncError::RateLimited {
                retry_after_secs, ..
            }) => {
                let mut next = next_backoff(
                    state.backoff,
                    self.config.backoff_floor,
                    self.config.backoff_ceiling,
                );
                if let Some(secs) = retry_after_secs {
                    next = next
                        .max(Duration::from_secs(*secs))
                        .min(self.config.backoff_ceiling);
                }
                tracing::warn!("rate limited; backing off {}s", next.as_secs());
                state.backoff = next;
            }
            Err(err) => tracing::warn!("sync cycle failed: {err}"),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Zero → `floor`; otherwise double, capped at `ceiling`.
pub fn next_backoff(current: Duration, floor: Duration, ceiling: Duration) -> Duration {
    if current.is_zero() {
        floor.min(ceiling)
    } else {
        current.saturating_mul(2).min(ceiling)
    }
}
