//! Request execution: pick a strategy, enforce the deadline.
//!
//! An [`Executor`] is built once at startup.  If the interpreter probe
//! succeeded it owns a [`ProcessInterpreter`] and every request goes to the
//! real interpreter; otherwise every request is simulated.  The choice never
//! changes while the process runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::interpreter::ProcessInterpreter;
use crate::script::{ExecutionResult, Method, Simulator};

/// Shared, immutable execution state.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: Option<ProcessInterpreter>,
    simulator: Arc<Simulator>,
    default_timeout_ms: u64,
    max_timeout_ms: u64,
}

impl Executor {
    pub fn new(
        interpreter: Option<ProcessInterpreter>,
        simulator: Simulator,
        default_timeout_ms: u64,
        max_timeout_ms: u64,
    ) -> Self {
        Executor {
            interpreter,
            simulator: Arc::new(simulator),
            default_timeout_ms,
            max_timeout_ms: max_timeout_ms.max(1),
        }
    }

    /// An executor that only ever simulates.
    pub fn simulated(simulator: Simulator) -> Self {
        Self::new(None, simulator, 10_000, 60_000)
    }

    pub fn interpreter_available(&self) -> bool {
        self.interpreter.is_some()
    }

    /// The strategy every request will use.
    pub fn method(&self) -> Method {
        if self.interpreter_available() {
            Method::DirectInterpreter
        } else {
            Method::EnhancedSimulation
        }
    }

    /// Effective deadline for a requested timeout.  Missing or zero means
    /// the default; anything above the maximum is clamped.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> u64 {
        match requested_ms {
            None | Some(0) => self.default_timeout_ms,
            Some(ms) => ms,
        }
        .min(self.max_timeout_ms)
    }

    /// Run `code` with the configured strategy, bounded by `timeout_ms`.
    pub async fn execute(&self, code: &str, timeout_ms: Option<u64>) -> ExecutionResult {
        let ms = self.effective_timeout(timeout_ms);
        let deadline = Duration::from_millis(ms);
        debug!(bytes = code.len(), timeout_ms = ms, method = ?self.method(), "executing");

        match &self.interpreter {
            Some(interp) => match tokio::time::timeout(deadline, interp.run(code)).await {
                Ok(Ok(stdout)) => ExecutionResult::direct(&stdout),
                Ok(Err(e)) => ExecutionResult::failure(Method::DirectInterpreter, e.to_string()),
                Err(_) => {
                    warn!(timeout_ms = ms, "interpreter run timed out");
                    ExecutionResult::timed_out(Method::DirectInterpreter, ms)
                }
            },
            None => {
                let simulator = Arc::clone(&self.simulator);
                let code = code.to_owned();
                // The blocking pass itself cannot be cancelled; its input
                // limits bound how long it keeps running after a timeout.
                let task = tokio::task::spawn_blocking(move || simulator.run(&code));
                match tokio::time::timeout(deadline, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        warn!(error = %e, "simulation task failed");
                        ExecutionResult::simulation_failed(e)
                    }
                    Err(_) => {
                        warn!(timeout_ms = ms, "simulation timed out");
                        ExecutionResult::timed_out(Method::EnhancedSimulation, ms)
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
