//! Error types for standup-sync.

use thiserror::Error;

/// All errors that can arise from store access, writes and sync cycles.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The object does not exist. Benign on reads; surfaced on deletes.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// The presented version tag is stale, or a create hit an existing object.
    #[error("version conflict on {path}")]
    VersionConflict { path: String },

    /// The store is throttling us (HTTP 403/429).
    #[error("rate limited by store (HTTP {status}){}", retry_hint(.retry_after_secs))]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    /// Missing or rejected credential.
    #[error("authorization failed: {message}")]
    AuthFailure { message: String },

    /// The team is protected and no passphrase is known for it.
    #[error("team '{team}' is protected by a passphrase")]
    PassphraseRequired { team: String },

    /// The known passphrase does not match the team registry entry.
    #[error("passphrase for team '{team}' does not match")]
    PassphraseMismatch { team: String },

    /// A create-only registry write found the team already registered.
    #[error("team '{team}' already exists")]
    TeamExists { team: String },

    /// Rejected input (e.g. a rating outside 0–10).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Any other non-success status from the store.
    #[error("store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, DNS or TLS failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a body we could not interpret.
    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SyncError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::RateLimited { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}

/// Map a non-success HTTP status to an error kind.
///
/// 404 is only an error for operations that need the object to exist; reads
/// and listings handle it before calling this.
pub fn classify_status(
    status: u16,
    path: &str,
    message: String,
    retry_after_secs: Option<u64>,
) -> SyncError {
    match status {
        404 => SyncError::NotFound {
            path: path.to_string(),
        },
        409 | 422 => SyncError::VersionConflict {
            path: path.to_string(),
        },
        403 | 429 => SyncError::RateLimited {
            status,
            retry_after_secs,
        },
        401 => SyncError::AuthFailure { message },
        _ => SyncError::Http { status, message },
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}
