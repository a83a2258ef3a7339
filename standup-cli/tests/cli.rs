use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;

use standup_core::{local, SessionId, StandupConfig, TeamName, WriterName};
use tempfile::TempDir;

fn standup_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("standup"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("STANDUP_TOKEN");
    cmd
}

/// Config pointing at a port nothing listens on.
fn write_offline_config(home: &Path) {
    let config = StandupConfig::new(
        "http://127.0.0.1:9/repos/acme/standups/contents",
        TeamName::from("core"),
        WriterName::from("Ada"),
    );
    local::save_config_at(home, &config).expect("save config");
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().expect("home");
    standup_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("status"))
        .stdout(contains("speaker"))
        .stdout(contains("watch"));
}

#[test]
fn init_writes_config() {
    let home = TempDir::new().expect("home");
    standup_cmd(home.path())
        .args([
            "init",
            "--store-url",
            "https://api.github.com/repos/acme/standups/contents",
            "--team",
            "core",
            "--name",
            "Ada",
        ])
        .assert()
        .success()
        .stdout(contains("Configured 'Ada' on team 'core'"));

    let config = local::load_config_at(home.path()).expect("config");
    assert_eq!(config.team, TeamName::from("core"));
    assert_eq!(config.writer, WriterName::from("Ada"));
    assert_eq!(config.branch, "main");
    assert_eq!(config.data_dir, "standups");

    standup_cmd(home.path())
        .args(["init", "--store-url", "https://x.test", "--team", "core", "--name", "Ada"])
        .assert()
        .failure()
        .stderr(contains("--force"));
}

#[test]
fn init_requires_a_team() {
    let home = TempDir::new().expect("home");
    standup_cmd(home.path())
        .args(["init", "--store-url", "https://x.test", "--name", "Ada"])
        .assert()
        .failure()
        .stderr(contains("--team is required"));
}

#[test]
fn commands_need_a_config() {
    let home = TempDir::new().expect("home");
    standup_cmd(home.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("standup init"));
}

#[test]
fn post_rejects_out_of_range_ratings() {
    let home = TempDir::new().expect("home");
    write_offline_config(home.path());
    standup_cmd(home.path())
        .args(["post", "--feeling", "11", "shipping"])
        .assert()
        .failure()
        .stderr(contains("11"));
}

#[test]
fn unreachable_store_reports_the_failure() {
    let home = TempDir::new().expect("home");
    write_offline_config(home.path());
    standup_cmd(home.path())
        .args(["--session", "2024-05-01", "status"])
        .assert()
        .failure()
        .stderr(contains("failed to fetch status for team 'core' session '2024-05-01'"));
}

#[test]
fn speaker_queue_runs_offline_with_an_explicit_roster() {
    let home = TempDir::new().expect("home");
    write_offline_config(home.path());
    let args = |extra: &[&str]| {
        let mut all = vec!["--session", "retro-7", "speaker"];
        all.extend_from_slice(extra);
        all.into_iter().map(String::from).collect::<Vec<_>>()
    };

    standup_cmd(home.path())
        .args(args(&["show"]))
        .assert()
        .success()
        .stdout(contains("not started"));

    standup_cmd(home.path())
        .args(args(&["next", "--roster", "Ada,Bob"]))
        .assert()
        .success()
        .stdout(contains("Speaking:"));

    let team = TeamName::from("core");
    let session = SessionId::from("retro-7");
    let queue = local::load_speaker_at(home.path(), &team, &session).expect("queue");
    let first = queue.speaking_now.clone().expect("someone speaking");
    assert_eq!(queue.ready_order.len(), 2);

    standup_cmd(home.path())
        .args(args(&["done"]))
        .assert()
        .success();
    let queue = local::load_speaker_at(home.path(), &team, &session).expect("queue");
    assert_eq!(queue.spoken, vec![first]);
    assert!(queue.speaking_now.is_none());

    standup_cmd(home.path())
        .args(args(&["next", "--roster", "Ada,Bob"]))
        .assert()
        .success();
    standup_cmd(home.path())
        .args(args(&["next", "--roster", "Ada,Bob"]))
        .assert()
        .success()
        .stdout(contains("Everyone has spoken."));

    standup_cmd(home.path())
        .args(args(&["reset"]))
        .assert()
        .success()
        .stdout(contains("not started"));
    let path = local::speaker_path_at(home.path(), &team, &session);
    assert!(fs::metadata(path).is_ok());
}
