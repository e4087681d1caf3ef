//! The report returned for every execution request.

use serde::{Deserialize, Serialize};

/// Output used when a run succeeds without printing anything.
pub const EMPTY_OUTPUT: &str = "Code executed successfully!";

/// Advisory attached to every simulated run.
pub const SIMULATION_NOTE: &str =
    "Enhanced simulation - install SUSA interpreter for full functionality";

/// Which execution strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    DirectInterpreter,
    EnhancedSimulation,
}

/// Final outcome of one execution.  Serialises to the JSON body the HTTP
/// bridge returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub method: Method,
    pub error: Option<String>,
    pub note: Option<String>,
}

impl ExecutionResult {
    /// A completed simulator pass.
    pub fn simulated(lines: &[String]) -> Self {
        ExecutionResult {
            success: true,
            output: if lines.is_empty() {
                EMPTY_OUTPUT.to_owned()
            } else {
                lines.join("\n")
            },
            method: Method::EnhancedSimulation,
            error: None,
            note: Some(SIMULATION_NOTE.to_owned()),
        }
    }

    /// A simulator pass that failed as a whole.
    pub fn simulation_failed(message: impl std::fmt::Display) -> Self {
        Self::failure(Method::EnhancedSimulation, format!("Simulation error: {message}"))
    }

    /// Captured stdout of a successful interpreter run.
    pub fn direct(stdout: &str) -> Self {
        ExecutionResult {
            success: true,
            output: match stdout.trim() {
                "" => EMPTY_OUTPUT.to_owned(),
                trimmed => trimmed.to_owned(),
            },
            method: Method::DirectInterpreter,
            error: None,
            note: None,
        }
    }

    /// Any failure: no output, `error` set.
    pub fn failure(method: Method, error: impl Into<String>) -> Self {
        ExecutionResult {
            success: false,
            output: String::new(),
            method,
            error: Some(error.into()),
            note: None,
        }
    }

    /// The caller's deadline passed before `method` finished.
    pub fn timed_out(method: Method, timeout_ms: u64) -> Self {
        Self::failure(method, format!("Execution timed out after {timeout_ms} ms"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
