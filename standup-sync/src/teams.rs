//! Team registry: one `<data_dir>/teams/<team>.team` object per team.

use std::collections::BTreeSet;

use chrono::Utc;

use standup_core::codec::{decode_registry, encode_registry};
use standup_core::{passphrase_hash, TeamName, TeamRegistryEntry, WriterName};

use crate::error::SyncError;
use crate::layout::{key_from_file_name, team_from_file_name, team_path};
use crate::store::{CachedStore, ListedObject, ObjectStore};

/// Read a team's registry entry. `None` means the team was never registered,
/// which makes it open.
pub fn load_team<S: ObjectStore>(
    store: &CachedStore<S>,
    data_dir: &str,
    team: &TeamName,
) -> Result<Option<TeamRegistryEntry>, SyncError> {
    let path = team_path(data_dir, team);
    Ok(store
        .fetch(&path)?
        .map(|entry| decode_registry(team, &entry.body)))
}

/// Register a new team. Fails with [`SyncError::TeamExists`] if any entry is
/// already present; registry entries are never overwritten.
pub fn create_team<S: ObjectStore>(
    store: &CachedStore<S>,
    data_dir: &str,
    team: &TeamName,
    passphrase: Option<&str>,
    creator: &WriterName,
) -> Result<TeamRegistryEntry, SyncError> {
    if team.0.trim().is_empty() {
        return Err(SyncError::Invalid("team name must not be empty".to_string()));
    }
    let entry = TeamRegistryEntry {
        team: team.clone(),
        passphrase_hash: passphrase
            .filter(|p| !p.is_empty())
            .map(|p| passphrase_hash(team, p)),
        created_at: Some(Utc::now()),
        created_by: Some(creator.clone()),
    };
    let path = team_path(data_dir, team);
    let message = format!("standup: register team {team}");
    match store.write(&path, &encode_registry(&entry), None, &message) {
        Ok(_) => {
            tracing::info!("registered team {team} ({})", lock_label(&entry));
            Ok(entry)
        }
        Err(err) if err.is_conflict() => Err(SyncError::TeamExists {
            team: team.0.clone(),
        }),
        Err(err) => Err(err),
    }
}

/// Gate access to `team` on `candidate`.
pub fn check_passphrase(
    entry: Option<&TeamRegistryEntry>,
    candidate: Option<&str>,
) -> Result<(), SyncError> {
    let Some(entry) = entry else {
        return Ok(());
    };
    if entry.verify(candidate) {
        return Ok(());
    }
    let team = entry.team.0.clone();
    match candidate {
        None => Err(SyncError::PassphraseRequired { team }),
        Some(_) => Err(SyncError::PassphraseMismatch { team }),
    }
}

/// Live team roster: registered teams merged with teams that only appear in
/// data file names. Sorted and deduplicated.
pub fn roster(registry: &[ListedObject], data: &[ListedObject]) -> Vec<TeamName> {
    registry
        .iter()
        .filter_map(|obj| team_from_file_name(&obj.name))
        .chain(
            data.iter()
                .filter_map(|obj| key_from_file_name(&obj.name))
                .map(|key| key.team),
        )
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn lock_label(entry: &TeamRegistryEntry) -> &'static str {
    if entry.is_open() {
        "open"
    } else {
        "passphrase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn listed(name: &str) -> ListedObject {
        ListedObject {
            path: format!("d/{name}"),
            name: name.to_string(),
            version: "v".to_string(),
        }
    }

    #[test]
    fn roster_merges_registry_and_legacy_names() {
        let registry = vec![listed("core.team"), listed("web.team")];
        let data = vec![
            listed("core -- Ada -- s1.txt"),
            listed("legacy -- Bob -- s1.txt"),
            listed("garbage.txt"),
        ];
        let teams: Vec<_> = roster(&registry, &data)
            .into_iter()
            .map(|t| t.0)
            .collect();
        assert_eq!(teams, vec!["core", "legacy", "web"]);
    }

    #[test]
    fn create_then_create_again_is_team_exists() {
        let store = CachedStore::new(MemoryStore::new());
        let team = TeamName::from("core");
        let ada = WriterName::from("Ada");
        let entry = create_team(&store, "d", &team, Some("s3cret"), &ada).expect("create");
        assert!(!entry.is_open());

        let err = create_team(&store, "d", &team, None, &ada).unwrap_err();
        assert!(matches!(err, SyncError::TeamExists { .. }));

        let loaded = load_team(&store, "d", &team).expect("load").expect("entry");
        assert_eq!(loaded.passphrase_hash, entry.passphrase_hash);
    }

    #[test]
    fn empty_passphrase_registers_open_team() {
        let store = CachedStore::new(MemoryStore::new());
        let team = TeamName::from("core");
        let entry =
            create_team(&store, "d", &team, Some(""), &WriterName::from("Ada")).expect("create");
        assert!(entry.is_open());
    }

    #[test]
    fn passphrase_gate_kinds() {
        let team = TeamName::from("core");
        let entry = TeamRegistryEntry {
            team: team.clone(),
            passphrase_hash: Some(passphrase_hash(&team, "s3cret")),
            created_at: None,
            created_by: None,
        };
        assert!(check_passphrase(None, None).is_ok());
        assert!(matches!(
            check_passphrase(Some(&entry), None),
            Err(SyncError::PassphraseRequired { .. })
        ));
        assert!(matches!(
            check_passphrase(Some(&entry), Some("nope")),
            Err(SyncError::PassphraseMismatch { .. })
        ));
        assert!(check_passphrase(Some(&entry), Some("s3cret")).is_ok());
    }
}
