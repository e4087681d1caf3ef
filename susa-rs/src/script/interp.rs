//! The fallback simulator.
//!
//! [`Simulator`] holds the resource limits and runs one forward pass per
//! program.  Each pass gets a fresh [`Interpreter`], which owns the variable
//! store and the output lines for that pass only.
//!
//! Failures are contained at the smallest possible unit:
//!
//! - a declaration whose literal cannot be converted is dropped
//!   ([`Outcome::Skipped`]);
//! - a print that fails becomes an inline diagnostic line
//!   ([`Outcome::Diagnostic`]);
//! - only a [`SimulationError`] (a limit on the program as a whole) fails
//!   the run.

use thiserror::Error;
use tracing::{debug, trace};

use super::{
    expand::{interpolate, ExpansionTooLarge},
    result::ExecutionResult,
    stmt::{parse_script, Stmt},
    value::{infer, unwrap_quoted, ValueError},
};
use crate::var::VarStore;

// ── Limits ────────────────────────────────────────────────────────────────────

/// Resource bounds for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted program, in bytes.
    pub max_source_bytes: usize,
    /// Largest accepted program, in lines.
    pub max_lines: usize,
    /// Longest text a single PRINT may produce, in bytes.
    pub max_line_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_source_bytes: 256 * 1024,
            max_lines: 10_000,
            max_line_bytes: 64 * 1024,
        }
    }
}

// ── Errors and outcomes ───────────────────────────────────────────────────────

/// A failure of the pass as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("program is {len} bytes, limit is {limit}")]
    SourceTooLarge { len: usize, limit: usize },
    #[error("program has {lines} lines, limit is {limit}")]
    TooManyLines { lines: usize, limit: usize },
}

/// A failure confined to one PRINT statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrintError {
    #[error("printed text exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error(transparent)]
    Expansion(#[from] ExpansionTooLarge),
}

/// What a single line contributed to the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A line of output (print result or banner).
    Emitted(String),
    /// Nothing: blank, comment, marker, unknown, or a dropped declaration.
    Skipped,
    /// A print failed; the diagnostic replaces its output.
    Diagnostic(String),
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// State of one simulator pass.
#[derive(Debug)]
pub struct Interpreter {
    pub vars: VarStore,
    pub output: Vec<String>,
    max_line_bytes: usize,
}

impl Interpreter {
    pub fn new(max_line_bytes: usize) -> Self {
        Interpreter {
            vars: VarStore::new(),
            output: Vec::new(),
            max_line_bytes,
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Emitted(text) | Outcome::Diagnostic(text) => self.output.push(text.clone()),
            Outcome::Skipped => {}
        }
    }

    /// Execute an already classified statement.  Does not record output.
    pub fn exec_stmt(&mut self, lineno: usize, stmt: Stmt<'_>) -> Outcome {
        trace!(lineno, ?stmt, "simulating");
        match stmt {
            Stmt::Banner(text) => Outcome::Emitted(text.to_owned()),
            Stmt::Let { name, literal } => {
                if let Err(e) = self.declare(name, literal) {
                    debug!(lineno, name, error = %e, "declaration dropped");
                }
                Outcome::Skipped
            }
            Stmt::Print(content) => match self.eval_print(content) {
                Ok(text) => Outcome::Emitted(text),
                Err(e) => {
                    debug!(lineno, error = %e, "print failed");
                    Outcome::Diagnostic(format!("Error processing PRINT at line {lineno}"))
                }
            },
            Stmt::Blank | Stmt::Comment | Stmt::Marker | Stmt::Ignored => Outcome::Skipped,
        }
    }

    /// `let name = literal`.  Nothing is written unless inference succeeds.
    fn declare(&mut self, name: &str, literal: &str) -> Result<(), ValueError> {
        let value = infer(literal)?;
        trace!(name, ty = value.type_name(), "declared");
        self.vars.set(name, value);
        Ok(())
    }

    /// Evaluate the content of a `PRINT` statement.
    ///
    /// Rules, first match wins: template string, plain string,
    /// `+` concatenation, variable name, raw text.
    pub fn eval_print(&self, content: &str) -> Result<String, PrintError> {
        let limit = self.max_line_bytes;
        let text = if let Some(template) = unwrap_quoted(content, "rt\"") {
            interpolate(template, &self.vars, limit)?
        } else if let Some(s) = unwrap_quoted(content, "\"") {
            s.to_owned()
        } else if content.contains('+') {
            self.concat(content)?
        } else if let Some(value) = self.vars.get(content) {
            value.to_string()
        } else {
            content.to_owned()
        };

        if text.len() > limit {
            return Err(PrintError::LineTooLong { limit });
        }
        Ok(text)
    }

    /// `a + "b" + c`: quoted segments lose their quotes, known variables
    /// are stringified, anything else is kept as written.
    fn concat(&self, content: &str) -> Result<String, PrintError> {
        let limit = self.max_line_bytes;
        content.split('+').try_fold(String::new(), |mut out, segment| {
            let segment = segment.trim();
            if let Some(s) = unwrap_quoted(segment, "\"") {
                out.push_str(s);
            } else if let Some(value) = self.vars.get(segment) {
                out.push_str(&value.to_string());
            } else {
                out.push_str(segment);
            }
            if out.len() > limit {
                return Err(PrintError::LineTooLong { limit });
            }
            Ok(out)
        })
    }
}

// ── Simulator ─────────────────────────────────────────────────────────────────

/// Runs programs through the heuristic line-by-line simulation.
///
/// Holds no per-run state; one instance can serve any number of runs,
/// concurrently if shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    limits: Limits,
}

impl Simulator {
    pub fn new(limits: Limits) -> Self {
        Simulator { limits }
    }

    /// Simulate `src` and build the final report.
    pub fn run(&self, src: &str) -> ExecutionResult {
        match self.exec(src) {
            Ok(interp) => ExecutionResult::simulated(&interp.output),
            Err(e) => {
                debug!(error = %e, "simulation failed");
                ExecutionResult::simulation_failed(e)
            }
        }
    }

    /// Run the pass and hand back its final state.
    pub fn exec(&self, src: &str) -> Result<Interpreter, SimulationError> {
        if src.len() > self.limits.max_source_bytes {
            return Err(SimulationError::SourceTooLarge {
                len: src.len(),
                limit: self.limits.max_source_bytes,
            });
        }
        let lines = src.split('\n').count();
        if lines > self.limits.max_lines {
            return Err(SimulationError::TooManyLines {
                lines,
                limit: self.limits.max_lines,
            });
        }

        let mut interp = Interpreter::new(self.limits.max_line_bytes);
        for (lineno, stmt) in parse_script(src) {
            let outcome = interp.exec_stmt(lineno, stmt);
            interp.record(&outcome);
        }
        Ok(interp)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
