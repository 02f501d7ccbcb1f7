// ABOUTME: End-to-end tests driving the schemeful binary's REPL over piped stdin

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn repl_prints_a_prompt_and_echoes_results() {
    Command::cargo_bin("schemeful")
        .unwrap()
        .write_stdin("(+ 1 2)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("> "))
        .stdout(predicate::str::contains('3'));
}

#[test]
fn repl_updates_the_question_mark_convenience_symbol() {
    Command::cargo_bin("schemeful")
        .unwrap()
        .write_stdin("(+ 1 2)\n(* ? 10)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("30"));
}

#[test]
fn repl_ignores_empty_lines() {
    Command::cargo_bin("schemeful")
        .unwrap()
        .write_stdin("\n\n(quote ok)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn repl_reports_an_error_and_keeps_going() {
    Command::cargo_bin("schemeful")
        .unwrap()
        .write_stdin("(/ 1 0)\n(quote still-alive)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("still-alive"));
}

#[test]
fn eof_terminates_the_repl_cleanly() {
    Command::cargo_bin("schemeful")
        .unwrap()
        .write_stdin("")
        .assert()
        .success();
}
