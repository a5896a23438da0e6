//! Integration tests for the signup binary.
//!
//! These tests verify end-to-end behavior including:
//! - Event administration
//! - Register / cancel / promotion workflow
//! - Roster display and CSV export
//! - Notice journal hand-off

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the CLI binary, isolated from any user config
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("signup"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn create_event(data_dir: &Path, capacity: u32, reserve: u32) {
    cli(data_dir)
        .args(["event", "create", "--name", "River cleanup"])
        .args(["--date", "2026-11-21", "--time", "09:00"])
        .args(["--capacity", capacity.to_string().as_str()])
        .args(["--reserve", reserve.to_string().as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created event 1"));
}

fn register(data_dir: &Path, user: &str) -> assert_cmd::assert::Assert {
    cli(data_dir)
        .args(["register", "--user", user, "1"])
        .assert()
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Volunteer event sign-up with reserve lists",
        ));
}

#[test]
fn test_event_create_and_list() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    create_event(data_dir, 2, 1);

    cli(data_dir)
        .args(["event", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("River cleanup"))
        .stdout(predicate::str::contains("Sat"))
        .stdout(predicate::str::contains("main 0/2"));

    assert!(data_dir.join("store/events.json").exists());
}

#[test]
fn test_invalid_event_rejected() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["event", "create", "--name", "Nothing"])
        .args(["--date", "2026-11-21", "--time", "09:00", "--capacity", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid event"));
}

#[test]
fn test_full_waitlist_cycle() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 2, 1);

    register(data_dir, "u1")
        .success()
        .stdout(predicate::str::contains("Registered for event 1"));
    register(data_dir, "u2").success();
    register(data_dir, "u3")
        .success()
        .stdout(predicate::str::contains("reserve list"));
    register(data_dir, "u4")
        .code(2)
        .stderr(predicate::str::contains("Event 1 is full"));

    cli(data_dir)
        .args(["cancel", "--user", "u1", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("u3 promoted from the reserve list"));

    register(data_dir, "u4")
        .success()
        .stdout(predicate::str::contains("reserve list"));

    cli(data_dir)
        .args(["roster", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Main list (2/2)"))
        .stdout(predicate::str::contains("1. u2"))
        .stdout(predicate::str::contains("2. u3"))
        .stdout(predicate::str::contains("Reserve list (1/1)"));
}

#[test]
fn test_duplicate_register_and_missing_cancel() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 1, 1);

    register(data_dir, "ana").success();
    register(data_dir, "ana")
        .code(2)
        .stderr(predicate::str::contains("already registered"));

    cli(data_dir)
        .args(["cancel", "--user", "ben", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No registration"));

    cli(data_dir)
        .args(["register", "--user", "ana", "42"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Event 42 not found"));
}

#[test]
fn test_roster_csv_export() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 1, 2);

    for user in ["ana", "ben", "cy"] {
        register(data_dir, user).success();
    }

    let csv_path = data_dir.join("roster.csv");
    cli(data_dir)
        .args(["roster", "1", "--csv"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 rows"));

    let csv_content = fs::read_to_string(&csv_path).expect("Failed to read CSV");
    let lines: Vec<_> = csv_content.lines().collect();
    assert_eq!(lines[0], "list,position,user_id,sequence,registered_at");
    assert!(lines[1].starts_with("main,1,ana,0,"));
    assert!(lines[2].starts_with("reserve,1,ben,1,"));
    assert!(lines[3].starts_with("reserve,2,cy,2,"));
}

#[test]
fn test_mine_lists_user_registrations() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 1, 1);

    register(data_dir, "ana").success();
    register(data_dir, "ben").success();

    cli(data_dir)
        .args(["mine", "--user", "ben"])
        .assert()
        .success()
        .stdout(predicate::str::contains("River cleanup"))
        .stdout(predicate::str::contains("reserve"));

    cli(data_dir)
        .args(["mine", "--user", "nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no registrations"));
}

#[test]
fn test_promotion_notice_journaled() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 1, 1);

    register(data_dir, "ana").success();
    register(data_dir, "ben").success();
    cli(data_dir)
        .args(["cancel", "--user", "ana", "1"])
        .assert()
        .success();

    let journal = fs::read_to_string(data_dir.join("notices.jsonl")).expect("Failed to read journal");
    let kinds: Vec<String> = journal
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            format!("{}:{}", value["user_id"].as_str().unwrap(), value["kind"].as_str().unwrap())
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["ana:registered", "ben:reserved", "ana:cancelled", "ben:promoted"]
    );

    cli(data_dir)
        .args(["notices", "--user", "ben"])
        .assert()
        .success()
        .stdout(predicate::str::contains("promoted from the reserve list"));
}

#[test]
fn test_remove_event_drops_registrations() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    create_event(data_dir, 2, 0);

    register(data_dir, "ana").success();
    register(data_dir, "ben").success();

    cli(data_dir)
        .args(["event", "remove", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 registrations dropped"));

    cli(data_dir)
        .args(["event", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No events."));
    assert!(!data_dir.join("store/ledgers/event-1.json").exists());
}
