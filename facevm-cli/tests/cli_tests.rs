//! Integration tests for the facevm CLI.
//!
//! These tests invoke the `facevm` binary as a subprocess and check
//! exit codes, stdout, and stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn facevm() -> Command {
    let mut cmd = Command::cargo_bin("facevm").unwrap();
    for var in ["FACEVM_STACK_CAPACITY", "FACEVM_HEAP_CAPACITY", "FACEVM_ENTRY", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

/// Return the workspace root (parent of facevm-cli/).
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Return the absolute path to a sample program.
fn test_program(name: &str) -> PathBuf {
    workspace_root().join("tests/programs").join(name)
}

/// Assemble a sample program into `dir`, returning the image path.
fn assemble_program(dir: &TempDir, name: &str) -> PathBuf {
    let output = dir.path().join(name).with_extension("fvm");
    facevm()
        .arg("assemble")
        .arg(test_program(name))
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    output
}

/// Assemble inline source into `dir`, returning the image path.
fn assemble_source(dir: &TempDir, source: &str) -> PathBuf {
    let input = dir.path().join("inline.fasm");
    fs::write(&input, source).unwrap();
    facevm().arg("assemble").arg(&input).assert().success();
    dir.path().join("inline.fvm")
}

// ---- Usage ----

#[test]
fn no_args_exits_with_usage() {
    facevm()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: facevm"));
}

#[test]
fn help_lists_subcommands() {
    facevm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("assemble"))
        .stdout(predicate::str::contains("disassemble"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn unknown_subcommand_fails() {
    facevm().arg("frobnicate").assert().failure();
}

// ---- Assemble ----

#[test]
fn assemble_writes_image_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("hello.fasm");
    fs::copy(test_program("hello.fasm"), &input).unwrap();

    facevm()
        .arg("assemble")
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("assembled 2 constants, 3 instructions"));

    let bytes = fs::read(dir.path().join("hello.fvm")).unwrap();
    assert_eq!(&bytes[..4], &0xBABE_FACEu32.to_le_bytes());
}

#[test]
fn assemble_with_explicit_output() {
    let dir = TempDir::new().unwrap();
    let output = assemble_program(&dir, "add.fasm");
    assert!(output.exists());
}

#[test]
fn assemble_missing_file_exits_1() {
    facevm()
        .args(["assemble", "/nonexistent/prog.fasm"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn assemble_error_reports_line_and_exits_1() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.fasm");
    fs::write(&input, "const 1\nM \"main\" V 0 0\nmain:\n  jump 3\n").unwrap();

    facevm()
        .arg("assemble")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 4: unknown opcode 'jump'"));
    assert!(!dir.path().join("bad.fvm").exists());
}

// ---- Run ----

#[test]
fn run_hello() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "hello.fasm");
    facevm()
        .arg("run")
        .arg(&image)
        .assert()
        .success()
        .stdout("hello, world\n");
}

#[test]
fn run_sample_programs() {
    let cases = [
        ("print5.fasm", "5\n"),
        ("add.fasm", "5\n"),
        ("arithmetic.fasm", "-4\n996\n"),
        ("strings.fasm", "second\nfirst\n"),
        ("nested.fasm", "42\n"),
        ("stop.fasm", "1\n"),
    ];
    let dir = TempDir::new().unwrap();
    for (name, expected) in cases {
        let image = assemble_program(&dir, name);
        facevm()
            .arg("run")
            .arg(&image)
            .assert()
            .success()
            .stdout(expected);
    }
}

#[test]
fn run_division_by_zero_exits_3_with_one_diagnostic() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "divzero.fasm");
    facevm()
        .arg("run")
        .arg(&image)
        .assert()
        .code(3)
        .stdout("")
        .stderr("[-] idiv: division by zero at offset 10\n");
}

#[test]
fn run_type_error_exits_3() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "type_error.fasm");
    facevm()
        .arg("run")
        .arg(&image)
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "iload: local 0 is string, expected int at offset 0",
        ));
}

#[test]
fn run_missing_image_exits_1() {
    facevm()
        .args(["run", "/nonexistent/prog.fvm"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read image"));
}

#[test]
fn run_bad_magic_exits_1() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("bad.fvm");
    fs::write(&image, [0xEF, 0xBE, 0xAD, 0xDE, 0x00]).unwrap();
    facevm()
        .arg("run")
        .arg(&image)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bad magic number"));
}

#[test]
fn run_with_other_entry_point() {
    let dir = TempDir::new().unwrap();
    let image = assemble_source(
        &dir,
        "const 2\nM \"main\" V 0 0\nM \"alt\" V 0 0\nmain:\n  ipush 1\n  iprint\n  ret\nalt:\n  ipush 2\n  iprint\n  ret\n",
    );
    facevm()
        .arg("run")
        .arg(&image)
        .args(["--entry", "alt"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn entry_point_from_environment() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "hello.fasm");
    facevm()
        .env("FACEVM_ENTRY", "nope")
        .arg("run")
        .arg(&image)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no method named 'nope'"));
}

#[test]
fn stack_capacity_from_environment() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "add.fasm");
    facevm()
        .env("FACEVM_STACK_CAPACITY", "1")
        .arg("run")
        .arg(&image)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("stack overflow"));
}

#[test]
fn stack_capacity_flag_overrides_environment() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "add.fasm");
    facevm()
        .env("FACEVM_STACK_CAPACITY", "1")
        .arg("run")
        .arg(&image)
        .args(["--stack-capacity", "64"])
        .assert()
        .success()
        .stdout("5\n");
}

// ---- Disassemble ----

#[test]
fn disassemble_prints_canonical_text() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "print5.fasm");
    facevm()
        .arg("disassemble")
        .arg(&image)
        .assert()
        .success()
        .stdout("const 1\nM \"main\" V 0 0\n\nmain:\n  ipush 5\n  iprint\n  ret\n");
}

#[test]
fn disassemble_then_assemble_gives_same_image() {
    let dir = TempDir::new().unwrap();
    let image = assemble_program(&dir, "strings.fasm");

    let output = facevm()
        .arg("disassemble")
        .arg(&image)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = dir.path().join("roundtrip.fasm");
    fs::write(&text, output).unwrap();

    facevm().arg("assemble").arg(&text).assert().success();
    assert_eq!(
        fs::read(dir.path().join("roundtrip.fvm")).unwrap(),
        fs::read(&image).unwrap()
    );
}

#[test]
fn disassemble_garbage_exits_1() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("junk.fvm");
    fs::write(&image, b"junk").unwrap();
    facevm()
        .arg("disassemble")
        .arg(&image)
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("error:"));
}
