//! Local persisted state under `~/.standup/`.
//!
//! # Storage layout
//!
//! ```text
//! ~/.standup/
//!   config.yaml                    (client config, mode 0600)
//!   passphrases.yaml               (team -> passphrase, mode 0600)
//!   speaker/
//!     <team>/
//!       <session>.yaml             (speaker queue snapshot, mode 0600)
//! ```
//!
//! None of this is replicated to the remote store.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StandupConfig;
use crate::error::LocalStateError;
use crate::speaker::SpeakerQueue;
use crate::types::{SessionId, TeamName};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.standup/`
pub fn standup_root_at(home: &Path) -> PathBuf {
    home.join(".standup")
}

/// `<home>/.standup/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    standup_root_at(home).join("config.yaml")
}

/// `<home>/.standup/passphrases.yaml`
pub fn passphrases_path_at(home: &Path) -> PathBuf {
    standup_root_at(home).join("passphrases.yaml")
}

/// `<home>/.standup/speaker/<team>/<session>.yaml`. Pure, no I/O.
pub fn speaker_path_at(home: &Path, team: &TeamName, session: &SessionId) -> PathBuf {
    standup_root_at(home)
        .join("speaker")
        .join(file_stem(&team.0))
        .join(format!("{}.yaml", file_stem(&session.0)))
}

/// Make an identifier safe to use as one path component.
pub fn file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// 2. Config
// ---------------------------------------------------------------------------

pub fn load_config_at(home: &Path) -> Result<StandupConfig, LocalStateError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(LocalStateError::ConfigNotFound { path });
    }
    read_yaml(&path)
}

/// `load_config_at` convenience wrapper.
pub fn load_config() -> Result<StandupConfig, LocalStateError> {
    load_config_at(&home()?)
}

pub fn save_config_at(home: &Path, config: &StandupConfig) -> Result<(), LocalStateError> {
    write_yaml(&config_path_at(home), config)
}

/// `save_config_at` convenience wrapper.
pub fn save_config(config: &StandupConfig) -> Result<(), LocalStateError> {
    save_config_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 3. Passphrase cache
// ---------------------------------------------------------------------------

/// All remembered passphrases. Empty if the file does not exist yet.
pub fn load_passphrases_at(home: &Path) -> Result<BTreeMap<TeamName, String>, LocalStateError> {
    let path = passphrases_path_at(home);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    read_yaml(&path)
}

pub fn cached_passphrase_at(
    home: &Path,
    team: &TeamName,
) -> Result<Option<String>, LocalStateError> {
    Ok(load_passphrases_at(home)?.remove(team))
}

/// `cached_passphrase_at` convenience wrapper.
pub fn cached_passphrase(team: &TeamName) -> Result<Option<String>, LocalStateError> {
    cached_passphrase_at(&home()?, team)
}

pub fn remember_passphrase_at(
    home: &Path,
    team: &TeamName,
    passphrase: &str,
) -> Result<(), LocalStateError> {
    let mut all = load_passphrases_at(home)?;
    all.insert(team.clone(), passphrase.to_string());
    write_yaml(&passphrases_path_at(home), &all)
}

/// `remember_passphrase_at` convenience wrapper.
pub fn remember_passphrase(team: &TeamName, passphrase: &str) -> Result<(), LocalStateError> {
    remember_passphrase_at(&home()?, team, passphrase)
}

/// Drop a remembered passphrase. Returns whether one was present.
pub fn forget_passphrase_at(home: &Path, team: &TeamName) -> Result<bool, LocalStateError> {
    let mut all = load_passphrases_at(home)?;
    if all.remove(team).is_none() {
        return Ok(false);
    }
    write_yaml(&passphrases_path_at(home), &all)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// 4. Speaker queue snapshots
// ---------------------------------------------------------------------------

/// The saved queue for (team, session), or the not-started queue.
pub fn load_speaker_at(
    home: &Path,
    team: &TeamName,
    session: &SessionId,
) -> Result<SpeakerQueue, LocalStateError> {
    let path = speaker_path_at(home, team, session);
    if !path.exists() {
        return Ok(SpeakerQueue::default());
    }
    read_yaml(&path)
}

/// `load_speaker_at` convenience wrapper.
pub fn load_speaker(team: &TeamName, session: &SessionId) -> Result<SpeakerQueue, LocalStateError> {
    load_speaker_at(&home()?, team, session)
}

pub fn save_speaker_at(
    home: &Path,
    team: &TeamName,
    session: &SessionId,
    queue: &SpeakerQueue,
) -> Result<(), LocalStateError> {
    write_yaml(&speaker_path_at(home, team, session), queue)
}

/// `save_speaker_at` convenience wrapper.
pub fn save_speaker(
    team: &TeamName,
    session: &SessionId,
    queue: &SpeakerQueue,
) -> Result<(), LocalStateError> {
    save_speaker_at(&home()?, team, session, queue)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, LocalStateError> {
    dirs::home_dir().ok_or(LocalStateError::HomeNotFound)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, LocalStateError> {
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|source| LocalStateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// serialize → `.tmp` sibling → `chmod 0600` → `rename`.
fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), LocalStateError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let yaml = serde_yaml::to_string(value)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), LocalStateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), LocalStateError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), LocalStateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), LocalStateError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
