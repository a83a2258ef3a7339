//! ETag cache: last known version tag, read validator and body per store path.
//!
//! Consulted before every remote read so that unchanged objects cost a
//! conditional request and no re-parse. There is no eviction: the object
//! universe is one file per writer per session plus one per team.
//! Entries are replaced when a read returns a new version or a local write
//! succeeds, and dropped when the object is deleted or reported absent.

use std::collections::HashMap;

use standup_core::StatusRecord;

/// One cached object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub version: String,
    /// `None` after a local write until the next full read.
    pub etag: Option<String>,
    pub body: String,
    /// Parsed form of `body`, memoised on first decode.
    pub record: Option<StatusRecord>,
}

#[derive(Debug, Default)]
pub struct EtagCache {
    entries: HashMap<String, CachedEntry>,
    hits: u64,
    refreshes: u64,
}

impl EtagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&CachedEntry> {
        self.entries.get(path)
    }

    pub fn version(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|e| e.version.as_str())
    }

    pub fn etag(&self, path: &str) -> Option<&str> {
        self.entries.get(path).and_then(|e| e.etag.as_deref())
    }

    /// Replace the entry for `path`. Any memoised record is discarded.
    pub fn put(
        &mut self,
        path: &str,
        version: impl Into<String>,
        etag: Option<String>,
        body: impl Into<String>,
    ) {
        self.refreshes += 1;
        self.entries.insert(
            path.to_string(),
            CachedEntry {
                version: version.into(),
                etag,
                body: body.into(),
                record: None,
            },
        );
    }

    /// Memoise the parsed record, but only if the entry still has `version`.
    pub fn attach_record(&mut self, path: &str, version: &str, record: StatusRecord) {
        if let Some(entry) = self.entries.get_mut(path) {
            if entry.version == version {
                entry.record = Some(record);
            }
        }
    }

    /// Count a read answered as "unchanged since this version".
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn invalidate(&mut self, path: &str) -> Option<CachedEntry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use standup_core::RecordKey;

    #[test]
    fn empty_cache_has_nothing() {
        let cache = EtagCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn put_replaces_and_drops_memoised_record() {
        let mut cache = EtagCache::new();
        cache.put("a", "v1", Some("W/\"e1\"".to_string()), "body1");
        cache.attach_record("a", "v1", StatusRecord::empty(&RecordKey::new("t", "w", "s")));
        assert!(cache.get("a").unwrap().record.is_some());
        assert_eq!(cache.etag("a"), Some("W/\"e1\""));

        cache.put("a", "v2", None, "body2");
        let entry = cache.get("a").unwrap();
        assert_eq!(entry.version, "v2");
        assert_eq!(entry.body, "body2");
        assert_eq!(cache.etag("a"), None);
        assert!(entry.record.is_none());
        assert_eq!(cache.refreshes(), 2);
    }

    #[test]
    fn attach_ignores_stale_version() {
        let mut cache = EtagCache::new();
        cache.put("a", "v2", None, "body");
        cache.attach_record("a", "v1", StatusRecord::empty(&RecordKey::new("t", "w", "s")));
        assert!(cache.get("a").unwrap().record.is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = EtagCache::new();
        cache.put("a", "v1", None, "body");
        assert!(cache.invalidate("a").is_some());
        assert!(cache.invalidate("a").is_none());
        assert_eq!(cache.len(), 0);
    }
}
