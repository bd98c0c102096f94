use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn offline_browse_loads_all_pages() {
    Command::cargo_bin("threadview")
        .unwrap()
        .args(["--offline", "demo-thread"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(contains("Sample thread"))
        .stdout(contains("actions: Edit, Delete"))
        .stdout(contains("offline mode"))
        .stdout(contains("access token in config"))
        .stdout(contains("3 comments shown (2 of 2 pages)"));
}

#[test]
fn offline_browse_stops_when_load_more_declined() {
    Command::cargo_bin("threadview")
        .unwrap()
        .args(["--offline", "demo-thread"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(contains("load more comments?"))
        .stdout(contains("offline mode"))
        .stdout(contains("access token in config").not())
        .stdout(contains("2 comments shown (1 of 2 pages)"));
}

#[test]
fn missing_thread_id_is_a_usage_error() {
    Command::cargo_bin("threadview")
        .unwrap()
        .arg("--offline")
        .assert()
        .code(2)
        .stderr(contains("usage"));
}
