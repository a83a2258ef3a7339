//! Store path layout.
//!
//! ```text
//! <data_dir>/
//!   <team> -- <writer> -- <session>.txt   (one status record)
//!   teams/
//!     <team>.team                         (one registry entry)
//! ```

use standup_core::local::file_stem;
use standup_core::{RecordKey, TeamName};

pub const RECORD_SUFFIX: &str = ".txt";
pub const TEAM_SUFFIX: &str = ".team";
pub const TEAMS_SUBDIR: &str = "teams";

pub fn data_dir(raw: &str) -> &str {
    raw.trim_matches('/')
}

/// `<data_dir>/<key>.txt`
pub fn record_path(data_dir_raw: &str, key: &RecordKey) -> String {
    format!(
        "{}/{}{RECORD_SUFFIX}",
        data_dir(data_dir_raw),
        file_stem(&key.to_string())
    )
}

/// `<data_dir>/teams`
pub fn teams_dir(data_dir_raw: &str) -> String {
    format!("{}/{TEAMS_SUBDIR}", data_dir(data_dir_raw))
}

/// `<data_dir>/teams/<team>.team`
pub fn team_path(data_dir_raw: &str, team: &TeamName) -> String {
    format!(
        "{}/{}{TEAM_SUFFIX}",
        teams_dir(data_dir_raw),
        file_stem(&team.0)
    )
}

/// Record key encoded in a data file name.
pub fn key_from_file_name(name: &str) -> Option<RecordKey> {
    RecordKey::parse(name.strip_suffix(RECORD_SUFFIX)?)
}

/// Team named by a registry file name.
pub fn team_from_file_name(name: &str) -> Option<TeamName> {
    let stem = name.strip_suffix(TEAM_SUFFIX)?.trim();
    (!stem.is_empty()).then(|| TeamName::from(stem))
}
