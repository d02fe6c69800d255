use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../unmc-ics-core/tests/fixtures/timetable.html"
);

#[test]
fn test_classes_from_file() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["classes", "--file", FIXTURE])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "COMP2013 - Developing Maintainable Software\nCOMP2004 - Operating Systems\nCOMP2001 - Software Engineering\n",
        ));
}

#[test]
fn test_classes_json() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["classes", "--file", FIXTURE, "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"COMP2004 - Operating Systems\""));
}

#[test]
fn test_generate_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("unmc_timetable.ics");

    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["generate", "--file", FIXTURE, "--start-date", "2024-09-02", "--output"])
        .arg(&output)
        .args(["--class", "COMP2001 - Software Engineering"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 events saved"));

    let ics_content = std::fs::read_to_string(output).unwrap();
    assert_eq!(ics_content.matches("BEGIN:VEVENT").count(), 4);
    assert!(!ics_content.contains("Operating Systems"));
}

#[test]
fn test_generate_json() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["generate", "--file", FIXTURE, "-s", "2024-09-02", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rrule\": \"FREQ=WEEKLY;COUNT=11;BYDAY=MO\""))
        .stdout(predicate::str::contains("\"start\": \"2025-02-05T10:00:00+08:00\""));
}

#[test]
fn test_rejects_foreign_url() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["classes", "--url", "http://example.com/timetable", "--no-cache"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timetable URL"));
}

#[test]
fn test_requires_a_source() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["classes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn test_url_and_file_conflict() {
    let mut cmd = cargo_bin_cmd!("unmc-ics");
    cmd.args(["classes", "--file", FIXTURE, "--url", "http://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
