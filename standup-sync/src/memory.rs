//! In-process [`ObjectStore`] with the same CAS semantics as the HTTP store.
//!
//! Used by tests and for offline dry runs. Faults can be queued to simulate
//! throttling, transport failures and concurrent writers. Like the content
//! API, reads hand out a weak `ETag` that differs from the CAS version, and
//! only that validator earns a "not modified".

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

use crate::error::SyncError;
use crate::store::{ListedObject, ObjectStore, ReadOutcome, RemoteObject};

/// A scripted failure consumed by the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Next call of any kind fails with HTTP 429.
    RateLimited,
    /// Next call of any kind fails at the transport layer.
    Transport,
    /// Next call of any kind is rejected with HTTP 401.
    Unauthorized,
    /// Another writer lands `body` at `path` just before the next write.
    ConcurrentWrite { path: String, body: String },
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub reads: u64,
    /// Reads answered "unchanged".
    pub not_modified: u64,
    pub writes: u64,
    pub deletes: u64,
    pub lists: u64,
}

#[derive(Debug, Clone)]
struct Stored {
    version: String,
    body: String,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Stored>,
    revision: u64,
    faults: VecDeque<Fault>,
    stats: MemoryStats,
}

impl Inner {
    fn store(&mut self, path: &str, body: &str) -> String {
        self.revision += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.revision.to_be_bytes());
        hasher.update(path.as_bytes());
        hasher.update(body.as_bytes());
        let mut version = hex::encode(hasher.finalize());
        version.truncate(40);
        self.objects.insert(
            path.to_string(),
            Stored {
                version: version.clone(),
                body: body.to_string(),
            },
        );
        version
    }

    /// Pop a fault that applies to this call, if one is queued.
    fn take_fault(&mut self, path: &str, is_write: bool) -> Result<(), SyncError> {
        let applies = match self.faults.front() {
            Some(Fault::ConcurrentWrite { .. }) => is_write,
            Some(_) => true,
            None => false,
        };
        if !applies {
            return Ok(());
        }
        match self.faults.pop_front() {
            Some(Fault::RateLimited) => Err(SyncError::RateLimited {
                status: 429,
                retry_after_secs: None,
            }),
            Some(Fault::Transport) => Err(SyncError::Transport(format!(
                "simulated connection reset on {path}"
            ))),
            Some(Fault::Unauthorized) => Err(SyncError::AuthFailure {
                message: "simulated bad credentials".to_string(),
            }),
            Some(Fault::ConcurrentWrite { path, body }) => {
                self.store(&path, &body);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object without any version check. Returns its version.
    pub fn seed(&self, path: &str, body: &str) -> String {
        self.lock().store(path, body)
    }

    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    pub fn body(&self, path: &str) -> Option<String> {
        self.lock().objects.get(path).map(|s| s.body.clone())
    }

    pub fn version(&self, path: &str) -> Option<String> {
        self.lock().objects.get(path).map(|s| s.version.clone())
    }

    /// The validator a read of `path` would carry.
    pub fn etag(&self, path: &str) -> Option<String> {
        self.lock().objects.get(path).map(|s| etag_for(&s.version))
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn stats(&self) -> MemoryStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryStore {
    fn read(&self, path: &str, known_etag: Option<&str>) -> Result<ReadOutcome, SyncError> {
        let mut inner = self.lock();
        inner.stats.reads += 1;
        inner.take_fault(path, false)?;
        let Some(stored) = inner.objects.get(path).cloned() else {
            return Ok(ReadOutcome::Absent);
        };
        let etag = etag_for(&stored.version);
        if known_etag == Some(etag.as_str()) {
            inner.stats.not_modified += 1;
            return Ok(ReadOutcome::Unchanged);
        }
        Ok(ReadOutcome::Found(RemoteObject {
            path: path.to_string(),
            size: stored.body.len() as u64,
            etag: Some(etag),
            version: stored.version,
            body: stored.body,
        }))
    }

    fn write(
        &self,
        path: &str,
        body: &str,
        expected_version: Option<&str>,
        _message: &str,
    ) -> Result<String, SyncError> {
        let mut inner = self.lock();
        inner.stats.writes += 1;
        inner.take_fault(path, true)?;
        let current = inner.objects.get(path).map(|s| s.version.clone());
        match (current.as_deref(), expected_version) {
            (None, None) => {}
            (Some(current), Some(expected)) if current == expected => {}
            _ => {
                return Err(SyncError::VersionConflict {
                    path: path.to_string(),
                })
            }
        }
        Ok(inner.store(path, body))
    }

    fn delete(&self, path: &str, version: &str, _message: &str) -> Result<(), SyncError> {
        let mut inner = self.lock();
        inner.stats.deletes += 1;
        inner.take_fault(path, false)?;
        let current = inner.objects.get(path).map(|s| s.version.clone());
        match current {
            None => Err(SyncError::NotFound {
                path: path.to_string(),
            }),
            Some(current) if current != version => Err(SyncError::VersionConflict {
                path: path.to_string(),
            }),
            Some(_) => {
                inner.objects.remove(path);
                Ok(())
            }
        }
    }

    fn list(&self, dir: &str, suffix: &str) -> Result<Vec<ListedObject>, SyncError> {
        let mut inner = self.lock();
        inner.stats.lists += 1;
        inner.take_fault(dir, false)?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(inner
            .objects
            .iter()
            .filter_map(|(path, stored)| {
                let name = path.strip_prefix(&prefix)?;
                if name.contains('/') || !name.ends_with(suffix) {
                    return None;
                }
                Some(ListedObject {
                    path: path.clone(),
                    name: name.to_string(),
                    version: stored.version.clone(),
                })
            })
            .collect())
    }
}

fn etag_for(version: &str) -> String {
    format!("W/\"{version}\"")
}
