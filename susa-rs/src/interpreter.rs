//! Adapter for the authoritative SUSA interpreter.
//!
//! The real interpreter is an external executable.  A program is written to
//! a temporary `.susa` file and the interpreter is run as
//! `<program> [args…] <file>`; its stdout is the program's output.  A
//! non-zero exit status is a failure, described by the first non-empty line
//! of stderr (falling back to stdout).
//!
//! Whether the interpreter exists is decided once, at startup, by
//! [`ProcessInterpreter::probe`].

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// How long `<program> --version` may take before the probe gives up.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// `line 12`, `Line 12:`, `at line 12`: the first one found tags the error.
static LINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bline\s+(\d+)\s*:?\s*").expect("line tag regex is valid"));

/// Why an interpreter run did not produce output.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The interpreter ran and reported an error.
    #[error("{}", render_failure(.line, .message))]
    Failed { line: Option<usize>, message: String },
    #[error("failed to write program file: {0}")]
    TempFile(#[source] io::Error),
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Prefix `Line N:` unless the message already names its line.
fn render_failure(line: &Option<usize>, message: &str) -> String {
    match line {
        Some(n) if !LINE_TAG.is_match(message) => format!("Line {n}: {message}"),
        _ => message.to_owned(),
    }
}

/// Runs programs through an external interpreter executable.
#[derive(Debug, Clone)]
pub struct ProcessInterpreter {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessInterpreter {
    /// `args` are passed before the program file (e.g. `["run"]`).
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        ProcessInterpreter {
            program: program.into(),
            args,
        }
    }

    /// Check that the interpreter starts and answers `--version`.
    pub async fn probe(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(PROBE_TIMEOUT, status).await {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                warn!(program = %self.program.display(), %status, "interpreter probe failed");
                false
            }
            Ok(Err(e)) => {
                debug!(program = %self.program.display(), error = %e, "interpreter not found");
                false
            }
            Err(_) => {
                warn!(program = %self.program.display(), "interpreter probe timed out");
                false
            }
        }
    }

    /// Execute `source` and return the interpreter's stdout.
    ///
    /// The child is killed if the returned future is dropped, so wrapping
    /// this in `tokio::time::timeout` enforces a deadline.
    pub async fn run(&self, source: &str) -> Result<String, InterpreterError> {
        let mut file = tempfile::Builder::new()
            .prefix("susa_")
            .suffix(".susa")
            .tempfile()
            .map_err(InterpreterError::TempFile)?;
        file.write_all(source.as_bytes())
            .and_then(|()| file.flush())
            .map_err(InterpreterError::TempFile)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| InterpreterError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        debug!(status = %output.status, "interpreter reported failure");
        Err(failure_from_output(
            &output.stderr,
            &output.stdout,
            &output.status.to_string(),
        ))
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_owned)
}

/// Build a [`InterpreterError::Failed`] from a failed run's streams.
fn failure_from_output(stderr: &[u8], stdout: &[u8], status: &str) -> InterpreterError {
    let Some(text) = first_line(stderr).or_else(|| first_line(stdout)) else {
        return InterpreterError::Failed {
            line: None,
            message: format!("interpreter exited with {status}"),
        };
    };
    let text = text.strip_prefix("Error: ").unwrap_or(&text);
    let line = LINE_TAG.captures(text).and_then(|c| c[1].parse().ok());
    // A leading "Line N:" tag is re-rendered by Display; drop it here.  An
    // embedded one stays and suppresses the prefix.
    let message = match LINE_TAG.find(text) {
        Some(m) if m.start() == 0 => &text[m.end()..],
        _ => text,
    };
    InterpreterError::Failed {
        line,
        message: message.to_owned(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
