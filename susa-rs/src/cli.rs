//! Command-line argument parsing.
//!
//! Usage:
//!   susa-bridge [-f[<file>]] [-b<addr>] [-p<port>] [-i<program>] [-sdjt] [-c<code>] [<file>|-]

use std::path::PathBuf;

use crate::config::Settings;

pub const USAGE: &str =
    "Usage: susa-bridge [-f[<file>]] [-b<addr>] [-p<port>] [-i<program>] [-sdjt] [-c<code>] [<file>|-]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Config-file specification.
    pub config: ConfigFile,
    /// Bind address override (`-b<addr>`).
    pub bind: Option<String>,
    /// Port override (`-p<port>`).
    pub port: Option<String>,
    /// Interpreter program override (`-i<program>`).
    pub interpreter: Option<String>,
    /// Never use the interpreter (`-s`).
    pub simulate_only: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Print the JSON result in one-shot modes (`-j`).
    pub json: bool,
    /// Run the built-in sample program (`-t`).
    pub self_test: bool,
    /// Program to run once; `None` means serve HTTP.
    pub source: Option<CodeSource>,
}

/// How to choose the config file.
#[derive(Debug, Default, PartialEq)]
pub enum ConfigFile {
    /// Search `./susa-bridge.rc`, then the user config directory (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip config files.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// Where a one-shot program comes from.
#[derive(Debug, PartialEq)]
pub enum CodeSource {
    /// `-c<code>`.
    Inline(String),
    /// A positional file argument.
    File(PathBuf),
    /// `-`: read standard input.
    Stdin,
}

impl CliArgs {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_to(&self, settings: &mut Settings) -> Result<(), String> {
        if let Some(bind) = &self.bind {
            settings.set("bind", bind)?;
        }
        if let Some(port) = &self.port {
            settings.set("port", port)?;
        }
        if let Some(program) = &self.interpreter {
            settings.set("interpreter", program)?;
        }
        if self.simulate_only {
            settings.simulate_only = true;
        }
        Ok(())
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                's' => args.simulate_only = true,
                'j' => args.json = true,
                't' => args.self_test = true,

                // -f[<file>]; the file must be attached so a following
                // program path is never mistaken for a config file.
                'f' => {
                    args.config = if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        ConfigFile::Explicit(PathBuf::from(file))
                    } else {
                        ConfigFile::Skip
                    };
                }

                // Value flags: -b<addr>, -p<port>, -i<program>, -c<code>
                flag @ ('b' | 'p' | 'i' | 'c') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'b' => args.bind = Some(value),
                        'p' => args.port = Some(value),
                        'i' => args.interpreter = Some(value),
                        _ => args.source = Some(CodeSource::Inline(value)),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    // Positional argument → program source.
    match positional.len() {
        0 => {}
        1 if args.source.is_some() => {
            return Err("-c and a program file are mutually exclusive".to_owned())
        }
        1 => {
            let p = positional.remove(0);
            args.source = Some(if p == "-" {
                CodeSource::Stdin
            } else {
                CodeSource::File(PathBuf::from(p))
            });
        }
        n => return Err(format!("too many arguments ({n})")),
    }

    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
