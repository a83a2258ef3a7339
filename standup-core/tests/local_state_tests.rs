//! Local state error messages, atomic-write safety and persistence round-trips.
//! Layout: ~/.standup/{config.yaml, passphrases.yaml, speaker/<team>/<session>.yaml}

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use standup_core::{local, LocalStateError, SpeakerQueue, StandupConfig, WriterName};

// ---------------------------------------------------------------------------
// 1. Config
// ---------------------------------------------------------------------------

#[test]
fn config_roundtrip() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut config = StandupConfig::new(
        "https://api.example.test/repos/acme/standups/contents",
        "core".into(),
        "Ada".into(),
    );
    config.token = Some("tkn".into());
    local::save_config_at(home.path(), &config).expect("save");

    home.child(".standup/config.yaml")
        .assert(predicate::str::contains("store_url"));
    let loaded = local::load_config_at(home.path()).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn corrupt_config_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".standup/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = local::load_config_at(home.path()).unwrap_err();
    assert!(matches!(err, LocalStateError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

// ---------------------------------------------------------------------------
// 2. Passphrases
// ---------------------------------------------------------------------------

#[test]
fn passphrases_are_per_team() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    local::remember_passphrase_at(home.path(), &"core".into(), "one").expect("remember");
    local::remember_passphrase_at(home.path(), &"infra".into(), "two").expect("remember");

    assert_eq!(
        local::cached_passphrase_at(home.path(), &"core".into()).expect("load"),
        Some("one".to_string())
    );
    assert!(local::forget_passphrase_at(home.path(), &"core".into()).expect("forget"));
    assert_eq!(
        local::cached_passphrase_at(home.path(), &"core".into()).expect("load"),
        None
    );
    assert_eq!(
        local::cached_passphrase_at(home.path(), &"infra".into()).expect("load"),
        Some("two".to_string())
    );
}

// ---------------------------------------------------------------------------
// 3. Speaker snapshots
// ---------------------------------------------------------------------------

#[test]
fn missing_snapshot_is_not_started() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let queue = local::load_speaker_at(home.path(), &"core".into(), &"s1".into()).expect("load");
    assert_eq!(queue, SpeakerQueue::default());
}

#[test]
fn snapshot_is_scoped_to_team_and_session() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let roster: Vec<WriterName> = ["A", "B", "C"].into_iter().map(WriterName::from).collect();
    let mut queue = SpeakerQueue::default();
    queue.advance(&roster, &mut StdRng::seed_from_u64(11));

    local::save_speaker_at(home.path(), &"core".into(), &"s1".into(), &queue).expect("save");
    let same = local::load_speaker_at(home.path(), &"core".into(), &"s1".into()).expect("load");
    let other = local::load_speaker_at(home.path(), &"core".into(), &"s2".into()).expect("load");

    assert_eq!(same, queue);
    assert_eq!(other, SpeakerQueue::default());
    home.child(".standup/speaker/core/s1.yaml.tmp")
        .assert(predicate::path::missing());
}
