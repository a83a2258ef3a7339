//! Debounced reaction writes.
//!
//! Toggles accumulate in a pending change set. Each toggle cancels the
//! scheduled flush and schedules a new one `window` later, so a burst of
//! toggles becomes a single write. After the write finishes, successfully or
//! not, a resync is requested.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use standup_core::RecordKey;
use standup_sync::{ObjectStore, ReactionChange, WriteCoordinator};

use crate::runtime::DaemonHandle;

/// Quiet period before pending reaction changes are written.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(800);

const RESYNC_SOURCE: &str = "reactions";

#[derive(Default)]
struct Pending {
    /// `(target, emoji) -> on`; the latest toggle wins.
    changes: BTreeMap<(String, String), bool>,
    /// Bumped on every schedule; a woken flush that is no longer the latest
    /// leaves the batch to its successor.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

pub struct ReactionDebouncer<S> {
    coordinator: WriteCoordinator<S>,
    owner: RecordKey,
    window: Duration,
    handle: DaemonHandle,
    pending: Arc<Mutex<Pending>>,
}

impl<S: ObjectStore + 'static> ReactionDebouncer<S> {
    pub fn new(coordinator: WriteCoordinator<S>, owner: RecordKey, handle: DaemonHandle) -> Self {
        Self::with_window(coordinator, owner, handle, DEBOUNCE_WINDOW)
    }

    pub fn with_window(
        coordinator: WriteCoordinator<S>,
        owner: RecordKey,
        handle: DaemonHandle,
        window: Duration,
    ) -> Self {
        Self {
            coordinator,
            owner,
            window,
            handle,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    pub fn owner(&self) -> &RecordKey {
        &self.owner
    }

    /// The flag as last seen in the owner's cached record, if there is one.
    /// Pending changes are not included.
    pub fn known_flag(&self, target: &RecordKey, emoji: &str) -> Option<bool> {
        self.coordinator
            .cached_record(&self.owner)
            .map(|record| record.reactions.is_set(&target.to_string(), emoji))
    }

    /// Flip a flag. `currently_set` is the caller's view of the stored flag;
    /// a pending change for the same flag takes precedence over it.
    /// Returns the new value. Must be called from within a tokio runtime.
    pub fn toggle(&self, target: &RecordKey, emoji: &str, currently_set: bool) -> bool {
        let key = (target.to_string(), emoji.to_string());
        let mut pending = lock(&self.pending);
        let on = !pending.changes.get(&key).copied().unwrap_or(currently_set);
        pending.changes.insert(key, on);
        self.reschedule(&mut pending);
        on
    }

    /// Number of flags waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).changes.len()
    }

    /// Cancel the timer and write whatever is pending right away.
    pub async fn flush(&self) {
        let changes = {
            let mut pending = lock(&self.pending);
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            pending.generation += 1;
            take_changes(&mut pending)
        };
        if !changes.is_empty() {
            write_batch(self.coordinator.clone(), self.owner.clone(), changes, &self.handle).await;
        }
    }

    fn reschedule(&self, pending: &mut Pending) {
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;

        let shared = Arc::clone(&self.pending);
        let coordinator = self.coordinator.clone();
        let owner = self.owner.clone();
        let handle = self.handle.clone();
        let window = self.window;
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let changes = {
                let mut pending = lock(&shared);
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
                take_changes(&mut pending)
            };
            if !changes.is_empty() {
                write_batch(coordinator, owner, changes, &handle).await;
            }
        }));
    }
}

fn take_changes(pending: &mut Pending) -> Vec<ReactionChange> {
    std::mem::take(&mut pending.changes)
        .into_iter()
        .map(|((target, emoji), on)| ReactionChange { target, emoji, on })
        .collect()
}

async fn write_batch<S: ObjectStore + 'static>(
    coordinator: WriteCoordinator<S>,
    owner: RecordKey,
    changes: Vec<ReactionChange>,
    handle: &DaemonHandle,
) {
    let count = changes.len();
    let key = owner.to_string();
    let result =
        tokio::task::spawn_blocking(move || coordinator.apply_reactions(&owner, &changes)).await;
    match result {
        Ok(Ok(outcome)) => tracing::info!(
            owner = %key,
            changes = count,
            attempts = outcome.attempts,
            "reaction changes written",
        ),
        Ok(Err(err)) => tracing::error!(owner = %key, error = %err, "reaction write failed"),
        Err(err) => tracing::error!(owner = %key, error = %err, "reaction write task failed"),
    }
    handle.request_resync(RESYNC_SOURCE);
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::channels;
    use standup_core::codec::decode_record;
    use standup_sync::layout::record_path;
    use standup_sync::{CachedStore, Fault, MemoryStore};
    use tokio::time::advance;

    fn coordinator() -> WriteCoordinator<MemoryStore> {
        WriteCoordinator::new(Arc::new(CachedStore::new(MemoryStore::new())), "standups")
    }

    fn ada() -> RecordKey {
        RecordKey::new("core", "Ada", "2024-05-01")
    }

    fn bob() -> RecordKey {
        RecordKey::new("core", "Bob", "2024-05-01")
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rapid_toggles_coalesce_into_one_write() {
        let coord = coordinator();
        let (handle, mut inbox) = channels();
        let debouncer = ReactionDebouncer::new(coord.clone(), ada(), handle);

        assert!(debouncer.toggle(&bob(), "🎉", false));
        advance(Duration::from_millis(300)).await;
        assert!(debouncer.toggle(&bob(), "👍", false));
        advance(Duration::from_millis(300)).await;
        assert!(!debouncer.toggle(&bob(), "👍", false));
        advance(Duration::from_millis(300)).await;
        assert_eq!(coord.store().inner().stats().writes, 0);
        assert_eq!(debouncer.pending_len(), 2);

        let source = inbox.resync_rx.recv().await.expect("resync");
        assert_eq!(source, "reactions");
        assert_eq!(coord.store().inner().stats().writes, 1);
        assert_eq!(debouncer.pending_len(), 0);

        let body = coord
            .store()
            .inner()
            .body(&record_path("standups", &ada()))
            .expect("written");
        let record = decode_record(&body);
        assert!(record.reactions.is_set(&bob().to_string(), "🎉"));
        assert!(!record.reactions.is_set(&bob().to_string(), "👍"));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn resync_is_requested_even_when_the_write_fails() {
        let coord = coordinator();
        coord.store().inner().inject(Fault::Unauthorized);
        let (handle, mut inbox) = channels();
        let debouncer = ReactionDebouncer::new(coord.clone(), ada(), handle);

        debouncer.toggle(&bob(), "🎉", false);
        let source = inbox.resync_rx.recv().await.expect("resync");
        assert_eq!(source, "reactions");
        assert!(coord.store().inner().body(&record_path("standups", &ada())).is_none());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn flush_writes_immediately() {
        let coord = coordinator();
        let (handle, mut inbox) = channels();
        let debouncer =
            ReactionDebouncer::with_window(coord.clone(), ada(), handle, Duration::from_secs(60));

        debouncer.toggle(&bob(), "🎉", false);
        debouncer.flush().await;
        assert_eq!(coord.store().inner().stats().writes, 1);
        assert_eq!(inbox.resync_rx.recv().await, Some("reactions"));

        // The cancelled timer must not produce a second write.
        advance(Duration::from_secs(120)).await;
        assert_eq!(coord.store().inner().stats().writes, 1);
        assert!(inbox.resync_rx.try_recv().is_err());
    }
}
