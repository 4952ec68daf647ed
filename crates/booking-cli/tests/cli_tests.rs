//! Integration tests for the `booking` CLI binary.
//!
//! These run the real binary against `tests/fixtures/calendar.json`. Commands
//! that write the snapshot back work on a copy in a temporary directory.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PROVIDER: &str = "11111111-1111-4111-8111-111111111111";
const LUNCH: &str = "22222222-2222-4222-8222-222222222222";
const STAFF_MEETING: &str = "33333333-3333-4333-8333-333333333333";

fn calendar_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/calendar.json")
}

fn booking() -> Command {
    let mut cmd = Command::cargo_bin("booking").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run against the read-only fixture.
fn booking_on_fixture() -> Command {
    let mut cmd = booking();
    cmd.args(["--data", calendar_json_path()]);
    cmd
}

/// Copy the fixture into a fresh directory for commands that write it back.
fn scratch_calendar() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calendar.json");
    std::fs::copy(calendar_json_path(), &path).unwrap();
    (dir, path)
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout must be JSON")
}

fn read_snapshot(path: &PathBuf) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_free_window_is_available() {
    let result = stdout_json(booking_on_fixture().args([
        "check",
        "--provider",
        PROVIDER,
        "--start",
        "2025-06-02T09:00:00Z",
    ]));

    assert_eq!(result["available"], true);
    assert_eq!(result["conflicts"], serde_json::json!([]));
}

#[test]
fn check_booked_window_reports_appointment_and_suggestion() {
    let result = stdout_json(booking_on_fixture().args([
        "check",
        "--provider",
        PROVIDER,
        "--start",
        "2025-06-02T09:30:00Z",
    ]));

    assert_eq!(result["available"], false);
    assert_eq!(result["conflicts"][0]["type"], "appointment");
    assert_eq!(result["conflicts"][0]["title"], "Follow-up");
    assert_eq!(result["suggestion"], "Next available slot at 10:00 AM");
}

#[test]
fn check_blocked_event_and_holiday() {
    booking_on_fixture()
        .args(["check", "--provider", PROVIDER, "--start", "2025-06-02T10:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staff meeting"))
        .stdout(predicate::str::contains("\"event\""));

    booking_on_fixture()
        .args(["check", "--provider", PROVIDER, "--start", "2025-12-25T10:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Public holiday"));
}

#[test]
fn check_outside_schedule() {
    let result = stdout_json(booking_on_fixture().args([
        "check",
        "--provider",
        PROVIDER,
        "--start",
        "2025-06-02T09:00:00Z",
        "--duration",
        "60",
    ]));

    assert_eq!(result["available"], false);
    assert_eq!(result["conflicts"].as_array().unwrap().len(), 1);
    assert_eq!(result["conflicts"][0]["type"], "outside_schedule");
    assert!(result.get("suggestion").is_none());
}

#[test]
fn check_rejects_malformed_input() {
    booking_on_fixture()
        .args(["check", "--provider", "not-a-uuid", "--start", "2025-06-02T09:00:00Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error"));

    booking_on_fixture()
        .args(["check", "--provider", PROVIDER, "--start", "tomorrow at nine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timestamp"));

    booking_on_fixture()
        .args([
            "check",
            "--provider",
            PROVIDER,
            "--start",
            "2025-06-02T09:00:00Z",
            "--duration",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duration must be positive"));
}

#[test]
fn check_rejects_an_out_of_range_duration() {
    booking_on_fixture()
        .args([
            "check",
            "--provider",
            PROVIDER,
            "--start",
            "2025-06-02T09:00:00Z",
            "--duration",
            "9223372036854775807",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"))
        .stderr(predicate::str::contains("panicked").not());
}

// ─────────────────────────────────────────────────────────────────────────────
// slots / events / expand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn slots_lists_only_free_windows() {
    let slots = stdout_json(booking_on_fixture().args([
        "slots",
        "--provider",
        PROVIDER,
        "--from",
        "2025-06-02",
        "--to",
        "2025-06-02",
    ]));

    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["startTime"], "2025-06-02T09:00:00Z");
    assert_eq!(slots[0]["available"], true);
}

#[test]
fn events_expands_the_recurring_block() {
    let entries = stdout_json(booking_on_fixture().args([
        "events",
        "--provider",
        PROVIDER,
        "--from",
        "2025-06-01",
        "--to",
        "2025-06-03",
    ]));

    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let occurrences = entries.iter().filter(|e| e["kind"] == "occurrence").count();
    assert_eq!(occurrences, 3);
    assert!(entries
        .iter()
        .any(|e| e["kind"] == "event" && e["title"] == "Staff meeting"));
}

#[test]
fn expand_stops_at_the_end_date() {
    let occurrences = stdout_json(booking_on_fixture().args([
        "expand", "--event", LUNCH, "--from", "2025-06-01", "--to", "2025-06-30",
    ]));

    let occurrences = occurrences.as_array().unwrap();
    assert_eq!(occurrences.len(), 7);
    assert_eq!(occurrences[6]["startTime"], "2025-06-07T12:00:00Z");
    assert!(occurrences.iter().all(|o| o["parentEventId"] == LUNCH));
}

#[test]
fn expand_accepts_a_day_starting_in_a_dst_gap() {
    // America/Santiago has no local midnight on 2025-09-07.
    let occurrences = stdout_json(booking_on_fixture().args([
        "--timezone",
        "America/Santiago",
        "expand",
        "--event",
        LUNCH,
        "--from",
        "2025-09-07",
        "--to",
        "2025-09-07",
    ]));

    assert_eq!(occurrences, serde_json::json!([]));
}

#[test]
fn expand_prints_rrule_text() {
    booking_on_fixture()
        .args([
            "--timezone",
            "Europe/Paris",
            "expand",
            "--event",
            LUNCH,
            "--from",
            "2025-06-01",
            "--to",
            "2025-06-30",
            "--rrule",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("DTSTART;TZID=Europe/Paris:20250601T140000"))
        .stdout(predicate::str::contains("RRULE:FREQ=DAILY"));
}

#[test]
fn expand_non_recurring_event_fails() {
    booking_on_fixture()
        .args([
            "expand",
            "--event",
            STAFF_MEETING,
            "--from",
            "2025-06-01",
            "--to",
            "2025-06-30",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to expand event"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn create_writes_the_snapshot_back() {
    let (dir, path) = scratch_calendar();
    let request = dir.path().join("event.json");
    std::fs::write(
        &request,
        r#"{
            "title": "Conference",
            "eventType": "blocked",
            "startTime": "2025-06-05T08:00:00Z",
            "endTime": "2025-06-05T17:00:00Z",
            "blocksAppointments": true
        }"#,
    )
    .unwrap();

    let created = stdout_json(booking().args([
        "--data",
        path.to_str().unwrap(),
        "create",
        "--provider",
        PROVIDER,
        "--input",
        request.to_str().unwrap(),
    ]));
    assert_eq!(created["title"], "Conference");
    assert_eq!(created["color"], "#FFB84D");

    let snapshot = read_snapshot(&path);
    let events = snapshot["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().any(|e| e["eventId"] == created["eventId"]));
}

#[test]
fn create_rejects_inverted_interval_without_writing() {
    let (dir, path) = scratch_calendar();
    let before = std::fs::read_to_string(&path).unwrap();
    let request = dir.path().join("event.json");
    std::fs::write(
        &request,
        r#"{
            "title": "Backwards",
            "eventType": "blocked",
            "startTime": "2025-06-05T17:00:00Z",
            "endTime": "2025-06-05T08:00:00Z"
        }"#,
    )
    .unwrap();

    booking()
        .args([
            "--data",
            path.to_str().unwrap(),
            "create",
            "--provider",
            PROVIDER,
            "--input",
            request.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn update_patches_only_given_fields() {
    let (dir, path) = scratch_calendar();
    let patch = dir.path().join("patch.json");
    std::fs::write(&patch, r#"{"title": "All-hands"}"#).unwrap();

    let updated = stdout_json(booking().args([
        "--data",
        path.to_str().unwrap(),
        "update",
        "--event",
        STAFF_MEETING,
        "--input",
        patch.to_str().unwrap(),
    ]));

    assert_eq!(updated["title"], "All-hands");
    assert_eq!(updated["startTime"], "2025-06-02T10:00:00Z");
    assert_ne!(updated["updatedAt"], "2025-05-20T08:00:00Z");
}

#[test]
fn delete_frees_the_slot() {
    let (_dir, path) = scratch_calendar();
    let data = path.to_str().unwrap();

    let result = stdout_json(booking().args(["--data", data, "delete", "--event", STAFF_MEETING]));
    assert_eq!(result["removed"], 1);

    let check = stdout_json(booking().args([
        "--data",
        data,
        "check",
        "--provider",
        PROVIDER,
        "--start",
        "2025-06-02T10:00:00Z",
    ]));
    assert_eq!(check["available"], true);

    booking()
        .args(["--data", data, "delete", "--event", STAFF_MEETING])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn migrate_is_idempotent() {
    let (_dir, path) = scratch_calendar();
    let data = path.to_str().unwrap();

    let first = stdout_json(booking().args(["--data", data, "migrate"]));
    assert_eq!(first["examined"], 1);
    assert_eq!(first["inserted"], 1);
    assert_eq!(first["removed"], 1);

    let snapshot = read_snapshot(&path);
    assert_eq!(snapshot["legacyTimeOff"], serde_json::json!([]));
    assert!(snapshot["events"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["title"] == "Time off" && e["color"] == "#F56565"));

    let second = stdout_json(booking().args(["--data", data, "migrate"]));
    assert_eq!(second["examined"], 0);
    assert_eq!(second["inserted"], 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and global flags
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn config_file_sets_the_zone() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"timezone": "Europe/Paris"}"#).unwrap();

    let result = stdout_json(booking_on_fixture().args([
        "--config",
        config.to_str().unwrap(),
        "check",
        "--provider",
        PROVIDER,
        "--start",
        "2025-06-02T09:30:00Z",
    ]));

    // 10:00 UTC is noon in Paris during summer time.
    assert_eq!(result["suggestion"], "Next available slot at 12:00 PM");
}

#[test]
fn unknown_timezone_fails() {
    booking_on_fixture()
        .args([
            "--timezone",
            "Nowhere/Special",
            "check",
            "--provider",
            PROVIDER,
            "--start",
            "2025-06-02T09:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn missing_data_file_fails() {
    booking()
        .args([
            "--data",
            "/nonexistent/calendar.json",
            "check",
            "--provider",
            PROVIDER,
            "--start",
            "2025-06-02T09:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn json_logs_go_to_stderr() {
    booking_on_fixture()
        .env("RUST_LOG", "booking_engine=debug")
        .args([
            "--json-logs",
            "check",
            "--provider",
            PROVIDER,
            "--start",
            "2025-06-02T09:00:00Z",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"DEBUG\""))
        .stdout(predicate::str::contains("\"available\": true"));
}

#[test]
fn no_args_shows_usage() {
    booking()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
