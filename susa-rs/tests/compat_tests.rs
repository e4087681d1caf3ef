/// Compatibility tests: run SUSA programs through the `susa-bridge` binary in
/// one-shot mode and verify the output matches expected values.
///
/// Each program is piped to the binary via stdin with `-f -s -` (no config
/// file, simulation only, read stdin).  Only stdout is compared; logging goes
/// to stderr.

use std::io::Write;
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `susa-bridge` binary built by this Cargo workspace.
fn binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_susa-bridge"))
}

/// Run the binary with `args`, feeding `stdin`.
fn run(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(binary())
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn susa-bridge");
    {
        let pipe = child.stdin.as_mut().expect("stdin not open");
        pipe.write_all(stdin.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

/// Run a program through the simulator and compare stdout line by line.
fn check(program: &str, expected: &[&str]) {
    let out = run(&["-f", "-s", "-"], program);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let got: Vec<&str> = stdout.lines().collect();

    assert!(
        out.status.success(),
        "\nProgram:\n{program}\nstderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        got, expected,
        "\n--- output mismatch ---\nProgram:\n{program}\nGot:\n{got:#?}\nWant:\n{expected:#?}"
    );
}

// ── Test cases ────────────────────────────────────────────────────────────────

#[test]
fn print_string_variable() {
    check("let x = \"abc\"\nPRINT x", &["abc"]);
}

#[test]
fn template_float_and_int() {
    check("let n = 3.5\nPRINT rt\"{n}\"", &["3.5"]);
    check("let n = 3\nPRINT rt\"{n}\"", &["3"]);
}

#[test]
fn template_arithmetic() {
    check("PRINT rt\"{2+2}\"", &["4"]);
    check("let n = 3\nPRINT rt\"{n / 2} and {n * (n + 1)}\"", &["1.5 and 12"]);
    check("let n = 6\nPRINT rt\"{n / 3}\"", &["2.0"]);
}

#[test]
fn unresolved_placeholders_stay() {
    check("PRINT rt\"{x}\"", &["{x}"]);
    check("PRINT rt\"{10 / 0}\"", &["{10 / 0}"]);
}

#[test]
fn list_variable() {
    check("let xs = [1, 2, 3]\nPRINT xs", &["[1, 2, 3]"]);
}

#[test]
fn banner_comments() {
    check("# === Section ===\n# just a comment\nPRINT \"x\"", &["=== Section ===", "x"]);
}

#[test]
fn concatenation() {
    check("let a = \"x\"\nPRINT \"val:\" + a", &["val:x"]);
}

#[test]
fn malformed_declaration_is_dropped() {
    check("let = \nPRINT \"ok\"", &["ok"]);
    check("let bad = 1-2-3\nPRINT bad", &["bad"]);
}

#[test]
fn block_markers_are_skipped() {
    check(
        "FUNC greet(name):\n    PRINT \"inside\"\nEND:\nSTART:\nPRINT \"after\"",
        &["inside", "after"],
    );
}

#[test]
fn empty_program() {
    check("", &["Code executed successfully!"]);
    check("# nothing here\nlet x = 1\n", &["Code executed successfully!"]);
}

#[test]
fn sample_program() {
    check(
        "let name = \"SUSA\"\nlet version = 1.0\nPRINT rt\"Language: {name} v{version}\"\n\
         let numbers = [1, 2, 3, 4, 5]\nPRINT \"Numbers: \" + numbers\nPRINT \"Hello from SUSA!\"",
        &["Language: SUSA v1.0", "Numbers: [1, 2, 3, 4, 5]", "Hello from SUSA!"],
    );
}

// ── Modes and exit status ─────────────────────────────────────────────────────

#[test]
fn inline_code_flag() {
    let out = run(&["-f", "-s", "-cPRINT \"hi\""], "");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hi\n");
}

#[test]
fn json_output() {
    let out = run(&["-f", "-sj", "-"], "PRINT \"hi\"");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(v["success"], true);
    assert_eq!(v["output"], "hi");
    assert_eq!(v["method"], "enhanced_simulation");
    assert!(v["note"].is_string());
}

#[test]
fn self_test_flag() {
    let out = run(&["-f", "-s", "-t"], "");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let (banner, json) = stdout.split_once('\n').unwrap();
    assert_eq!(banner, "Execution Result:");
    let v: serde_json::Value = serde_json::from_str(json).expect("valid JSON");
    assert_eq!(
        v["output"],
        "Language: SUSA v1.0\nNumbers: [1, 2, 3, 4, 5]\nHello from SUSA!"
    );
}

#[test]
fn failure_exits_nonzero() {
    let mut rc = tempfile::NamedTempFile::new().unwrap();
    writeln!(rc, "/set max_source_bytes=8").unwrap();
    let flag = format!("-f{}", rc.path().display());

    let out = run(&[&flag, "-s", "-"], "PRINT \"longer than eight bytes\"");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Error: Simulation error: "), "{stderr}");
}

#[test]
fn missing_program_file() {
    let out = run(&["-f", "-s", "/nonexistent/prog.susa"], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error: "));
}

#[test]
fn unknown_flag_is_usage_error() {
    let out = run(&["-z"], "");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage: susa-bridge"));
}
