//! Integration tests for core CLI contract behavior.
//!
//! Everything here runs without hardware: help/version output and the
//! argument-level refusals that happen before a serial port is opened.

use predicates::prelude::*;

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("cbl").expect("binary builds");
    // Keep environment-configured defaults out of the assertions.
    cmd.env_remove("CBL_PORT")
        .env_remove("CBL_BAUD")
        .env_remove("CBL_TIMEOUT");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cbl"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cbl"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn subcommands_are_listed_in_help() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("info")
                .and(predicate::str::contains("erase"))
                .and(predicate::str::contains("write"))
                .and(predicate::str::contains("jump"))
                .and(predicate::str::contains("protect")),
        );
}

#[test]
fn missing_port_is_reported() {
    cli_cmd()
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("serial port"));
}

#[test]
fn erase_without_range_or_all_is_refused_before_opening_a_port() {
    cli_cmd()
        .args(["erase"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));
}

#[test]
fn erase_with_sector_but_no_count_is_refused() {
    cli_cmd()
        .args(["erase", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("count"));
}

#[test]
fn protection_level_two_is_refused_client_side() {
    cli_cmd()
        .args(["protect", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("irreversible"));
}

#[test]
fn option_byte_level_two_encoding_is_also_refused() {
    cli_cmd()
        .args(["protect", "204"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("irreversible"));
}

#[test]
fn bad_jump_address_is_rejected_by_the_parser() {
    cli_cmd()
        .args(["jump", "0xZZZZ"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid address"));
}
