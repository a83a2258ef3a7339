//! Remote object store contract and its cache-aware wrapper.
//!
//! The store only offers optimistic primitives: conditional reads keyed by an
//! opaque validator (the HTTP `ETag`) and compare-and-swap writes/deletes keyed
//! by the object's version tag. The two are not interchangeable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use standup_core::codec::decode_record_at;
use standup_core::{RecordKey, StatusRecord};

use crate::cache::{CachedEntry, EtagCache};
use crate::error::SyncError;

/// A fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub path: String,
    /// CAS tag for writes and deletes.
    pub version: String,
    /// Validator for conditional reads, when the store sent one.
    pub etag: Option<String>,
    pub body: String,
    pub size: u64,
}

/// Result of a (possibly conditional) read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The object still matches the validator the caller presented.
    Unchanged,
    Found(RemoteObject),
    Absent,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub path: String,
    /// File name without the directory.
    pub name: String,
    pub version: String,
}

/// Typed access to a versioned file store.
///
/// `read` answers [`ReadOutcome::Unchanged`] only when `known_etag` is the
/// validator of the current content. `write` with `expected_version: None`
/// means "create"; it must fail with [`SyncError::VersionConflict`] if the
/// object already exists.
pub trait ObjectStore: Send + Sync {
    fn read(&self, path: &str, known_etag: Option<&str>) -> Result<ReadOutcome, SyncError>;

    /// Returns the new version tag.
    fn write(
        &self,
        path: &str,
        body: &str,
        expected_version: Option<&str>,
        message: &str,
    ) -> Result<String, SyncError>;

    fn delete(&self, path: &str, version: &str, message: &str) -> Result<(), SyncError>;

    /// Files directly inside `dir` whose name ends with `suffix`. A missing
    /// directory lists as empty.
    fn list(&self, dir: &str, suffix: &str) -> Result<Vec<ListedObject>, SyncError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn read(&self, path: &str, known_etag: Option<&str>) -> Result<ReadOutcome, SyncError> {
        (**self).read(path, known_etag)
    }

    fn write(
        &self,
        path: &str,
        body: &str,
        expected_version: Option<&str>,
        message: &str,
    ) -> Result<String, SyncError> {
        (**self).write(path, body, expected_version, message)
    }

    fn delete(&self, path: &str, version: &str, message: &str) -> Result<(), SyncError> {
        (**self).delete(path, version, message)
    }

    fn list(&self, dir: &str, suffix: &str) -> Result<Vec<ListedObject>, SyncError> {
        (**self).list(dir, suffix)
    }
}

// ---------------------------------------------------------------------------
// CachedStore
// ---------------------------------------------------------------------------

/// An [`ObjectStore`] paired with its [`EtagCache`].
///
/// Every read presents the cached validator; every successful read or write
/// refreshes the cache entry for that path. A write leaves no validator
/// behind, so the next read of that path is unconditional. Created once and shared by `Arc`
/// between the sync engine and the write coordinator.
pub struct CachedStore<S> {
    store: S,
    cache: Mutex<EtagCache>,
}

impl<S: ObjectStore> CachedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Mutex::new(EtagCache::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Conditional read through the cache. `None` means absent.
    pub fn fetch(&self, path: &str) -> Result<Option<CachedEntry>, SyncError> {
        let known = self.cache().etag(path).map(str::to_owned);
        match self.store.read(path, known.as_deref())? {
            ReadOutcome::Unchanged => {
                let mut cache = self.cache();
                match cache.get(path).cloned() {
                    Some(entry) => {
                        cache.record_hit();
                        tracing::trace!("cache hit: {path}");
                        Ok(Some(entry))
                    }
                    // Entry vanished while the request was in flight.
                    None => {
                        drop(cache);
                        self.fetch_fresh(path)
                    }
                }
            }
            ReadOutcome::Found(object) => Ok(Some(self.remember(path, object))),
            ReadOutcome::Absent => {
                self.cache().invalidate(path);
                Ok(None)
            }
        }
    }

    /// Unconditional read; still refreshes the cache.
    pub fn fetch_fresh(&self, path: &str) -> Result<Option<CachedEntry>, SyncError> {
        match self.store.read(path, None)? {
            ReadOutcome::Found(object) => Ok(Some(self.remember(path, object))),
            ReadOutcome::Unchanged => Err(SyncError::Malformed(format!(
                "unconditional read of {path} answered 'not modified'"
            ))),
            ReadOutcome::Absent => {
                self.cache().invalidate(path);
                Ok(None)
            }
        }
    }

    /// Fetch and decode a status record, reusing the memoised parse when the
    /// store reports the object unchanged.
    pub fn fetch_record(
        &self,
        path: &str,
        key: &RecordKey,
    ) -> Result<Option<StatusRecord>, SyncError> {
        let Some(entry) = self.fetch(path)? else {
            return Ok(None);
        };
        if let Some(record) = entry.record {
            return Ok(Some(record));
        }
        let record = decode_record_at(key, &entry.body);
        self.cache()
            .attach_record(path, &entry.version, record.clone());
        Ok(Some(record))
    }

    /// The cached copy of a record, decoded on demand. Never touches the store.
    pub fn cached_record(&self, path: &str, key: &RecordKey) -> Option<StatusRecord> {
        let entry = self.cache().get(path).cloned()?;
        if let Some(record) = entry.record {
            return Some(record);
        }
        let record = decode_record_at(key, &entry.body);
        self.cache()
            .attach_record(path, &entry.version, record.clone());
        Some(record)
    }

    /// CAS write; on success the cache holds the new version and body.
    pub fn write(
        &self,
        path: &str,
        body: &str,
        expected_version: Option<&str>,
        message: &str,
    ) -> Result<String, SyncError> {
        let version = self.store.write(path, body, expected_version, message)?;
        self.cache().put(path, version.clone(), None, body);
        Ok(version)
    }

    /// CAS delete; on success the cache entry is dropped.
    pub fn delete(&self, path: &str, version: &str, message: &str) -> Result<(), SyncError> {
        self.store.delete(path, version, message)?;
        self.cache().invalidate(path);
        Ok(())
    }

    pub fn list(&self, dir: &str, suffix: &str) -> Result<Vec<ListedObject>, SyncError> {
        self.store.list(dir, suffix)
    }

    pub fn cached_version(&self, path: &str) -> Option<String> {
        self.cache().version(path).map(str::to_owned)
    }

    pub fn cached_etag(&self, path: &str) -> Option<String> {
        self.cache().etag(path).map(str::to_owned)
    }

    /// (entries, hits, refreshes)
    pub fn cache_stats(&self) -> (usize, u64, u64) {
        let cache = self.cache();
        (cache.len(), cache.hits(), cache.refreshes())
    }

    fn remember(&self, path: &str, object: RemoteObject) -> CachedEntry {
        let entry = CachedEntry {
            version: object.version,
            etag: object.etag,
            body: object.body,
            record: None,
        };
        self.cache().put(
            path,
            entry.version.clone(),
            entry.etag.clone(),
            entry.body.clone(),
        );
        entry
    }

    fn cache(&self) -> MutexGuard<'_, EtagCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
