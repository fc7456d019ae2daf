use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_main_surfaces() {
    Command::cargo_bin("scribeq")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transcribe"))
        .stdout(predicate::str::contains("library"))
        .stdout(predicate::str::contains("keys"));
}

#[test]
fn transcribe_requires_at_least_one_input() {
    Command::cargo_bin("scribeq")
        .unwrap()
        .arg("transcribe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("INPUT"));
}
