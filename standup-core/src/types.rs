//! Domain types for team status records.
//!
//! One [`StatusRecord`] exists per (team, writer, session). Each writer's own
//! record also carries that writer's reaction flags ([`ReactionState`]); team-wide
//! totals are derived from those flags and never stored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a team; also the registry file stem.
    TeamName
);
string_newtype!(
    /// Display name of a person posting status.
    WriterName
);
string_newtype!(
    /// Identifier of one standup session (by default the UTC date).
    SessionId
);

impl SessionId {
    /// The default session for `at`: its UTC date, `YYYY-MM-DD`.
    pub fn for_date(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y-%m-%d").to_string())
    }
}

/// Separator between the three components of a [`RecordKey`].
pub const KEY_SEPARATOR: &str = " -- ";

/// Logical identity of a status record: `"<team> -- <writer> -- <session>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub team: TeamName,
    pub writer: WriterName,
    pub session: SessionId,
}

impl RecordKey {
    pub fn new(
        team: impl Into<TeamName>,
        writer: impl Into<WriterName>,
        session: impl Into<SessionId>,
    ) -> Self {
        Self {
            team: team.into(),
            writer: writer.into(),
            session: session.into(),
        }
    }

    /// Inverse of `Display`. Returns `None` unless the input has exactly three
    /// non-empty components.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(KEY_SEPARATOR);
        let team = parts.next()?.trim();
        let writer = parts.next()?.trim();
        let session = parts.next()?.trim();
        if parts.next().is_some() || team.is_empty() || writer.is_empty() || session.is_empty()
        {
            return None;
        }
        Some(Self::new(team, writer, session))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.team, self.writer, self.session
        )
    }
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// The reaction flags one writer has toggled, keyed by target record key.
///
/// `version` is the unix-millis timestamp of the last local change and only
/// ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReactionState {
    #[serde(rename = "v", default)]
    pub version: i64,
    #[serde(default)]
    pub flags: BTreeMap<String, BTreeSet<String>>,
}

impl ReactionState {
    pub fn is_set(&self, target: &str, emoji: &str) -> bool {
        self.flags
            .get(target)
            .map(|set| set.contains(emoji))
            .unwrap_or(false)
    }

    /// Set or clear one flag. Returns `true` if the state changed.
    pub fn set(&mut self, target: &str, emoji: &str, on: bool) -> bool {
        if on {
            return self
                .flags
                .entry(target.to_owned())
                .or_default()
                .insert(emoji.to_owned());
        }
        let Some(set) = self.flags.get_mut(target) else {
            return false;
        };
        let removed = set.remove(emoji);
        if set.is_empty() {
            self.flags.remove(target);
        }
        removed
    }

    /// Flip one flag and return its new value.
    pub fn toggle(&mut self, target: &str, emoji: &str) -> bool {
        let on = !self.is_set(target, emoji);
        self.set(target, emoji, on);
        on
    }

    /// Advance `version` to `at`, or by one millisecond if the clock is behind.
    /// Saturates at `i64::MAX`; remote payloads may carry any value.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.version = at.timestamp_millis().max(self.version.saturating_add(1));
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One writer's status for one session.
///
/// `feeling` and `productivity` are 0–10; `None` means unset, which is not the
/// same as a zero rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub team: TeamName,
    pub writer: WriterName,
    pub session: SessionId,
    pub feeling: Option<u8>,
    pub productivity: Option<u8>,
    pub update: String,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: ReactionState,
}

/// Highest accepted rating.
pub const MAX_RATING: u8 = 10;

impl StatusRecord {
    /// An empty record for `key`: no ratings, no text, no reactions.
    pub fn empty(key: &RecordKey) -> Self {
        Self {
            team: key.team.clone(),
            writer: key.writer.clone(),
            session: key.session.clone(),
            feeling: None,
            productivity: None,
            update: String::new(),
            updated_at: None,
            reactions: ReactionState::default(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            team: self.team.clone(),
            writer: self.writer.clone(),
            session: self.session.clone(),
        }
    }
}

/// Registry entry for one team. Absence of a passphrase means the team is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRegistryEntry {
    pub team: TeamName,
    pub passphrase_hash: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<WriterName>,
}

impl TeamRegistryEntry {
    pub fn is_open(&self) -> bool {
        self.passphrase_hash.is_none()
    }

    /// `true` if the team is open or `candidate` hashes to the stored digest.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        match (&self.passphrase_hash, candidate) {
            (None, _) => true,
            (Some(expected), Some(candidate)) => {
                *expected == passphrase_hash(&self.team, candidate)
            }
            (Some(_), None) => false,
        }
    }
}

/// Hex SHA-256 of `"<team>:<passphrase>"`.
pub fn passphrase_hash(team: &TeamName, passphrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(team.0.as_bytes());
    hasher.update(b":");
    hasher.update(passphrase.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
