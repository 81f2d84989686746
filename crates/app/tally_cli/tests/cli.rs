use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_prints_package_name() {
    Command::cargo_bin("tally")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tally_cli"));
}

#[test]
fn help_lists_admin_commands() {
    Command::cargo_bin("tally")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create-admin")
                .and(predicate::str::contains("unlock"))
                .and(predicate::str::contains("set-setting"))
                .and(predicate::str::contains("next-id")),
        );
}

#[test]
fn create_admin_requires_email() {
    Command::cargo_bin("tally")
        .unwrap()
        .args(["create-admin", "--password", "secret-pass"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--email"));
}
