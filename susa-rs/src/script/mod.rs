//! SUSA fallback simulator.
//!
//! When the real SUSA interpreter is not installed, programs are run through
//! a line-oriented approximation of the language instead:
//!
//! - `let name = literal` declarations with literal type inference
//! - `PRINT` of strings, variables, `+` concatenations and `rt"…"` templates
//! - `{name}` and `{arithmetic}` placeholders inside templates
//! - `# === banner ===` comments echoed as section markers
//!
//! Blocks, functions and control flow are recognised only to be skipped.
//!
//! # Quick start
//!
//! ```rust
//! use susa_bridge::script::simulate;
//!
//! let result = simulate("let n = 6\nPRINT rt\"{n * 7}\"");
//! assert!(result.success);
//! assert_eq!(result.output, "42");
//! ```

pub mod expand;
pub mod expr;
pub mod interp;
pub mod result;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use interp::{Interpreter, Limits, Simulator};
pub use result::{ExecutionResult, Method};
pub use value::Value;

/// Simulate `src` with default limits.
pub fn simulate(src: &str) -> ExecutionResult {
    Simulator::default().run(src)
}
