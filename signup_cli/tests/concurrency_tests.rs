//! Concurrency tests for the signup binary.
//!
//! These tests verify that multiple processes sharing one data directory
//! never overrun an event's capacity:
//! - Simultaneous registrations are serialized per event
//! - Simultaneous cancellations promote each waiter exactly once
//! - The store stays valid JSON under load

use assert_cmd::Command;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("signup"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn create_event(data_dir: &Path, capacity: u32, reserve: u32) {
    cli(data_dir)
        .args(["event", "create", "--name", "Blood drive"])
        .args(["--date", "2026-12-12", "--time", "08:30"])
        .args(["--capacity", capacity.to_string().as_str()])
        .args(["--reserve", reserve.to_string().as_str()])
        .assert()
        .success();
}

fn read_ledger(data_dir: &Path) -> serde_json::Value {
    let path = data_dir.join("store/ledgers/event-1.json");
    let content = std::fs::read_to_string(&path).expect("Failed to read ledger");
    serde_json::from_str(&content).expect("Ledger contains invalid JSON")
}

/// Run `args` for every user at once, returning each process's stdout
fn run_all(data_dir: &PathBuf, users: Vec<String>, verb: &'static str) -> Vec<String> {
    let barrier = Arc::new(Barrier::new(users.len()));

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let data_dir = data_dir.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let output = cli(&data_dir)
                    .args([verb, "--user", user.as_str(), "1"])
                    .timeout(Duration::from_secs(20))
                    .assert()
                    .success()
                    .get_output()
                    .stdout
                    .clone();
                String::from_utf8(output).expect("stdout is UTF-8")
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect()
}

#[test]
fn test_concurrent_registrations_respect_capacity() {
    const N: usize = 8;
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    create_event(&data_dir, 1, (N - 1) as u32);

    let users: Vec<_> = (0..N).map(|i| format!("racer{}", i)).collect();
    let outputs = run_all(&data_dir, users, "register");

    let registered = outputs
        .iter()
        .filter(|out| out.contains("Registered for event 1"))
        .count();
    let reserve = outputs
        .iter()
        .filter(|out| out.contains("reserve list"))
        .count();
    assert_eq!(registered, 1, "Expected exactly one main-list winner");
    assert_eq!(reserve, N - 1);

    let ledger = read_ledger(&data_dir);
    let registrations = ledger["registrations"].as_array().unwrap();
    assert_eq!(registrations.len(), N);

    let sequences: HashSet<_> = registrations
        .iter()
        .map(|r| r["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences.len(), N, "Sequence numbers must be unique");
}

#[test]
fn test_concurrent_cancellations_promote_in_order() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    create_event(&data_dir, 3, 3);

    for i in 0..6 {
        cli(&data_dir)
            .args(["register", "--user", format!("u{}", i).as_str(), "1"])
            .assert()
            .success();
    }

    let users: Vec<_> = (0..3).map(|i| format!("u{}", i)).collect();
    let outputs = run_all(&data_dir, users, "cancel");

    let mut promoted: Vec<_> = outputs
        .iter()
        .filter_map(|out| {
            out.lines()
                .find(|l| l.contains("promoted"))
                .and_then(|l| l.split_whitespace().nth(1))
                .map(str::to_string)
        })
        .collect();
    promoted.sort();
    assert_eq!(promoted, vec!["u3", "u4", "u5"]);

    let ledger = read_ledger(&data_dir);
    let registrations = ledger["registrations"].as_array().unwrap();
    assert_eq!(registrations.len(), 3);
    assert!(registrations.iter().all(|r| r["status"] == "registered"));
}

#[test]
fn test_reads_during_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    create_event(&data_dir, 5, 5);

    let reader_dir = data_dir.clone();
    let reader = thread::spawn(move || {
        for _ in 0..5 {
            cli(&reader_dir)
                .args(["roster", "1"])
                .timeout(Duration::from_secs(10))
                .assert()
                .success();
            thread::sleep(Duration::from_millis(5));
        }
    });

    let users: Vec<_> = (0..10).map(|i| format!("v{}", i)).collect();
    run_all(&data_dir, users, "register");
    reader.join().expect("Reader thread panicked");

    let ledger = read_ledger(&data_dir);
    assert_eq!(ledger["registrations"].as_array().unwrap().len(), 10);
}
