use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_config_json() -> &'static str {
    r#"
{
  "version": 1,
  "settings": {
    "firing_window_secs": 60,
    "tick_interval_ms": 20
  },
  "alarms": ["06:00", "10:00"]
}
"#
}

#[test]
fn diagnostics_reports_due_alarm() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--diagnostics")
        .arg("--no-audio")
        .args(["--start-at", "08:00:30"])
        .args(["--alarm", "08:00"])
        .args(["--pacing-ticks", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tick result: DUE 08:00"))
        .stdout(predicate::str::contains("Pending alarm: 08:00"))
        .stdout(predicate::str::contains("Tone would play: yes"))
        .stdout(predicate::str::contains("Audio: inert (audio disabled)"));
}

#[test]
fn diagnostics_skips_alarms_from_config_that_already_passed() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("alarmclock.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--diagnostics")
        .arg("--no-audio")
        .arg("--config")
        .arg(config)
        .args(["--start-at", "09:00"])
        .args(["--pacing-ticks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alarms: 2"))
        .stdout(predicate::str::contains("Tick result: PAST 06:00"))
        .stdout(predicate::str::contains("Scheduler state: WAITING"))
        .stdout(predicate::str::contains("Pending alarm: 10:00"))
        .stdout(predicate::str::contains("Ticks: 2"));
}

#[test]
fn malformed_config_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("alarmclock.json");
    fs::write(&config, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--diagnostics")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn malformed_alarm_flag_is_rejected() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--diagnostics")
        .arg("--no-audio")
        .args(["--alarm", "25:99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --alarm value '25:99'"));
}

#[test]
fn console_adds_lists_and_ignores_duplicates() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--console")
        .arg("--no-audio")
        .args(["--start-at", "06:00"])
        .write_stdin("add 09:15\nadd 09:15\nadd breakfast\nadd 07:00\nlist\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("added 09:15"))
        .stdout(predicate::str::contains("ignored 09:15"))
        .stdout(predicate::str::contains("ignored breakfast"))
        .stdout(predicate::str::contains("07:00 next\n09:15 on\n"));
}

#[test]
fn console_rings_and_silences_alarm() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--console")
        .arg("--no-audio")
        .args(["--start-at", "08:00:30"])
        .args(["--alarm", "08:00"])
        .write_stdin("off 08:00\nstatus\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ringing 08:00"))
        .stdout(predicate::str::contains("silenced 08:00"))
        .stdout(predicate::str::contains("state DUE | pending 08:00 | tone stopped"));
}

#[test]
fn console_survives_undecodable_input() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--console")
        .arg("--no-audio")
        .args(["--start-at", "06:00"])
        .write_stdin(b"\xff\xfe\nadd 07:00\nlist\n".to_vec())
        .assert()
        .success()
        .stdout(predicate::str::contains("added 07:00"))
        .stdout(predicate::str::contains("07:00 next"));
}

#[test]
fn console_ignores_unpadded_times() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--console")
        .arg("--no-audio")
        .args(["--start-at", "06:00"])
        .write_stdin("add 7:5\nlist\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored 7:5"))
        .stdout(predicate::str::contains("no alarms"));
}
