//! CLI smoke tests for the opslookup binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn opslookup() -> Command {
    Command::cargo_bin("opslookup").unwrap()
}

#[test]
fn list_shows_all_plugins() {
    opslookup()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("url_to_backend"))
        .stdout(predicate::str::contains("netscaler_adc_servers_from_url"))
        .stdout(predicate::str::contains("ldap_host"))
        .stdout(predicate::str::contains("secrets_safe"))
        .stdout(predicate::str::contains("timedelta"));
}

#[test]
fn run_timedelta_shifts_the_date() {
    opslookup()
        .args([
            "run",
            "timedelta",
            "08-25-2023 05:57:37",
            "-O",
            "delta=+16 days",
            "-O",
            "format=%m-%d-%Y %H:%M:%S",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("09-10-2023 05:57:37"));
}

#[test]
fn run_date_tz_converts_timezones() {
    opslookup()
        .args([
            "run",
            "date_tz",
            "08-25-2023 05:57:37",
            "-O",
            "in_tz=UTC",
            "-O",
            "out_tz=UTC",
            "--format",
            "yaml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("08-25-2023 05:57:37"));
}

#[test]
fn run_worknotes_without_marker_yields_empty_list() {
    opslookup()
        .args(["run", "worknotes_data", "plain text, nothing structured"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn unknown_plugin_fails() {
    opslookup()
        .args(["run", "no_such_plugin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn malformed_option_fails() {
    opslookup()
        .args(["run", "timedelta", "2023-01-01T00:00:00.0+0000", "-O", "delta"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key=value"));
}

#[test]
fn bad_delta_unit_fails() {
    opslookup()
        .args([
            "run",
            "timedelta",
            "2023-01-01T00:00:00.0+0000",
            "-O",
            "delta=+1 fortnights",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fortnights"));
}
