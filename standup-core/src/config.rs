//! Client configuration, persisted as `~/.standup/config.yaml`.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{SessionId, TeamName, WriterName};

/// Environment variable that overrides the configured store token.
pub const TOKEN_ENV: &str = "STANDUP_TOKEN";

/// Everything a client needs to reach the store and identify itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandupConfig {
    /// Base URL of the content API, e.g.
    /// `https://api.github.com/repos/acme/standups/contents`.
    pub store_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the store that holds record files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub writer: WriterName,
    pub team: TeamName,
    /// Fixed session id; today's UTC date when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_backoff_floor_secs")]
    pub backoff_floor_secs: u64,
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer_email: Option<String>,
}

impl StandupConfig {
    pub fn new(store_url: impl Into<String>, team: TeamName, writer: WriterName) -> Self {
        Self {
            store_url: store_url.into(),
            branch: default_branch(),
            data_dir: default_data_dir(),
            token: None,
            writer,
            team,
            session: None,
            poll_interval_secs: default_poll_interval_secs(),
            backoff_floor_secs: default_backoff_floor_secs(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
            committer_email: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session
            .clone()
            .unwrap_or_else(|| SessionId::for_date(Utc::now()))
    }

    /// `$STANDUP_TOKEN` if set and non-empty, else the configured token.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff_floor(&self) -> Duration {
        Duration::from_secs(self.backoff_floor_secs)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs.max(self.backoff_floor_secs))
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_data_dir() -> String {
    "standups".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_backoff_floor_secs() -> u64 {
    5
}

fn default_backoff_ceiling_secs() -> u64 {
    300
}
