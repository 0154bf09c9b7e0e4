//! End-to-end tests for the `boardsim` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assembler as _;
use clap as _;
use hardware as _;
use rstest as _;
use sim_core as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

fn boardsim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_boardsim"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run boardsim")
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn run_prints_registers_and_lamps() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "lamps.asm",
        "; light lamps 0 and 2\nORG $0200\nLDA #$05\nSTA $10\nEND\n",
    );

    let output = boardsim(&[
        "run",
        source.to_str().unwrap(),
        "--device",
        "Led display:8:16",
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("A    05 5"), "{text}");
    assert!(text.contains("Led display: .....*.* @16 x05 5"), "{text}");
}

#[test]
fn run_edu1_countdown() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "count.asm",
        "MOVA #3\nloop: DEC A\nJMPZ done\nJMP loop\ndone: .END\n",
    );

    let output = boardsim(&["run", source.to_str().unwrap(), "--arch", "edu1"]);

    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("A    00 0"), "{text}");
    assert!(text.contains("Z=1"), "{text}");
}

#[test]
fn run_reports_the_step_limit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "spin.asm", "loop: JMP loop\n.END\n");

    let output = boardsim(&[
        "run",
        source.to_str().unwrap(),
        "--arch",
        "edu1",
        "--max-steps",
        "25",
    ]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("program did not end within 25 steps"));
}

#[test]
fn check_prints_listing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "two.asm", "LDA 10\n.END\n");

    let output = boardsim(&["check", source.to_str().unwrap(), "--arch", "edu1"]);

    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("00: 01 0A"), "{text}");
    assert!(rows[1].starts_with("02: FF"), "{text}");
}

#[test]
fn check_reports_every_error_with_its_line() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "bad.asm",
        "ORG $0200\nBNE nowhere\nFROB\nEND\n",
    );

    let output = boardsim(&["check", source.to_str().unwrap()]);

    assert!(!output.status.success());
    let errors = stderr(&output);
    assert!(errors.contains("Line 2: nowhere: unknown label"), "{errors}");
    assert!(errors.contains("Line 3: Invalid mnemonic FROB"), "{errors}");
}

#[test]
fn missing_source_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("missing.asm");

    let output = boardsim(&["run", missing.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing.asm"));
}

#[test]
fn unknown_architecture() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "nop.asm", "NOP\n");

    let output = boardsim(&["run", source.to_str().unwrap(), "--arch", "z80"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown architecture `z80`"));
}

#[test]
fn list_shows_registries() {
    let output = boardsim(&["list"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("  6502"));
    assert!(text.contains("  edu1"));
    assert!(text.contains("  Led display"));
}
