//! E2E checks of the outer error frame: the binary must exit 0 on every
//! recoverable failure and report it as a single `::warning::` line.
//!
//! Each test runs the `sift` binary as a subprocess with a controlled
//! environment.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn sift_cmd() -> Command {
    let mut cmd = Command::cargo_bin("sift").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_EVENT_NAME")
        .env_remove("GITHUB_EVENT_PATH")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("INPUT_SIMILARITY_THRESHOLD")
        .env_remove("INPUT_DUPLICATE_THRESHOLD")
        .env_remove("INPUT_MAX_RESULTS")
        .env_remove("INPUT_INDEX_BRANCH");
    cmd.env("SIFT_LOG", "error");
    cmd
}

#[test]
fn missing_required_env_warns_and_exits_zero() {
    sift_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("::warning::"))
        .stdout(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
fn out_of_range_threshold_warns_and_exits_zero() {
    sift_cmd()
        .env("GITHUB_TOKEN", "tkn")
        .env("GITHUB_EVENT_NAME", "issues")
        .env("GITHUB_EVENT_PATH", "/tmp/e.json")
        .env("GITHUB_REPOSITORY", "acme/repo")
        .env("INPUT_DUPLICATE_THRESHOLD", "2")
        .assert()
        .success()
        .stdout(predicate::str::contains("::warning::"))
        .stdout(predicate::str::contains("INPUT_DUPLICATE_THRESHOLD"));
}

#[test]
fn malformed_repository_warns_and_exits_zero() {
    sift_cmd()
        .env("GITHUB_TOKEN", "tkn")
        .env("GITHUB_EVENT_NAME", "issues")
        .env("GITHUB_EVENT_PATH", "/tmp/e.json")
        .env("GITHUB_REPOSITORY", "not-a-repo")
        .assert()
        .success()
        .stdout(predicate::str::contains("::warning::"))
        .stdout(predicate::str::contains("owner/repo"));
}

#[test]
fn unreachable_remote_warns_and_exits_zero() {
    // A valid config whose state pull cannot succeed (no usable remote);
    // whatever the failure mode, the process must stay on the warning path.
    let mut event_file = tempfile::NamedTempFile::new().unwrap();
    event_file
        .write_all(br#"{"issue": {"number": 1, "title": "t"}}"#)
        .unwrap();

    sift_cmd()
        .env("GITHUB_TOKEN", "invalid-token")
        .env("GITHUB_EVENT_NAME", "issues")
        .env("GITHUB_EVENT_PATH", event_file.path())
        .env("GITHUB_REPOSITORY", "sift-bot/does-not-exist-sift-e2e")
        .timeout(std::time::Duration::from_secs(120))
        .assert()
        .success()
        .stdout(predicate::str::contains("::warning::"));
}
