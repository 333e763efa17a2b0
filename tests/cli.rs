use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn eval_prints_the_result() {
    let mut cmd = Command::cargo_bin("asteria").expect("binary exists");
    cmd.arg("eval").arg("return 1 + 2 + 3;");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("6"));
}

#[test]
fn run_executes_a_script_with_arguments() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("greet.ast");
    fs::write(&script, "return \"hello \" + args[0];").expect("write script");

    let mut cmd = Command::cargo_bin("asteria").expect("binary exists");
    cmd.arg("run").arg(&script).arg("world");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("hello world"));
}

#[test]
fn shebang_scripts_run() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tool.ast");
    fs::write(&script, "#!/usr/bin/env asteria\nreturn 7;").expect("write script");

    let mut cmd = Command::cargo_bin("asteria").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn parse_errors_fail_with_a_position() {
    let mut cmd = Command::cargo_bin("asteria").expect("binary exists");
    cmd.arg("eval").arg("var x = \"unclosed;");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("string literal unclosed"));
}

#[test]
fn uncaught_exceptions_fail_with_a_backtrace() {
    let mut cmd = Command::cargo_bin("asteria").expect("binary exists");
    cmd.arg("eval").arg("throw \"kaboom\";");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("kaboom"));
}
