//! `susa-bridge.rc` configuration.
//!
//! Settings are layered, lowest precedence first: built-in defaults, the rc
//! file, environment variables, then command-line flags.
//!
//! The rc file is line oriented:
//!
//! | Line | Action |
//! |------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | change a setting |
//! | Lines starting with `;` or `#` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! Bad values on recognised lines are collected as [`ConfigError`]s and do
//! not stop loading.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::script::Limits;

/// Config file name looked up in the working and config directories.
pub const CONFIG_FILE_NAME: &str = "susa-bridge.rc";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Every tunable of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: IpAddr,
    pub port: u16,
    /// Interpreter executable, looked up on `PATH` when not a path.
    pub interpreter: String,
    /// Arguments placed before the program file.
    pub interpreter_args: Vec<String>,
    /// Never probe for or use the interpreter.
    pub simulate_only: bool,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub max_body_bytes: usize,
    /// How long a client may take to send its whole request.
    pub read_timeout_ms: u64,
    pub max_source_bytes: usize,
    pub max_lines: usize,
    pub max_line_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let limits = Limits::default();
        Settings {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8765,
            interpreter: "susa".to_owned(),
            interpreter_args: vec!["run".to_owned()],
            simulate_only: false,
            default_timeout_ms: 10_000,
            max_timeout_ms: 60_000,
            max_body_bytes: 1024 * 1024,
            read_timeout_ms: 10_000,
            max_source_bytes: limits.max_source_bytes,
            max_lines: limits.max_lines,
            max_line_bytes: limits.max_line_bytes,
        }
    }
}

impl Settings {
    /// Parse a config string on top of the defaults.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut settings = Settings::default();
        let errors = settings.apply_str(s);
        (settings, errors)
    }

    /// Read and parse a config file on top of the defaults.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply every `/set` in `s`.  Returns errors for recognised lines that
    /// could not be applied.
    pub fn apply_str(&mut self, s: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));

            if cmd == "set" {
                let tokens = split_args(args_str.trim());
                if let Err(message) = parse_set(&tokens).and_then(|(n, v)| self.set(&n, &v)) {
                    errors.push(ConfigError { line: lineno, message });
                }
            }
        }

        errors
    }

    /// Apply `SUSA_BRIDGE_BIND`, `SUSA_BRIDGE_PORT` and `SUSA_INTERPRETER`
    /// as found by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut errors = Vec::new();
        for (var, name) in [
            ("SUSA_BRIDGE_BIND", "bind"),
            ("SUSA_BRIDGE_PORT", "port"),
            ("SUSA_INTERPRETER", "interpreter"),
        ] {
            if let Some(value) = lookup(var) {
                if let Err(e) = self.set(name, &value) {
                    errors.push(format!("{var}: {e}"));
                }
            }
        }
        errors
    }

    /// Set one setting by name from its textual value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match name {
            "bind" => self.bind = parse_value(name, value)?,
            "port" => self.port = parse_value(name, value)?,
            "interpreter" => {
                if value.is_empty() {
                    return Err("interpreter: cannot be empty".into());
                }
                self.interpreter = value.to_owned();
            }
            "interpreter_args" => self.interpreter_args = split_args(value),
            "simulate_only" => self.simulate_only = parse_bool(name, value)?,
            "default_timeout_ms" => self.default_timeout_ms = parse_value(name, value)?,
            "max_timeout_ms" => self.max_timeout_ms = parse_value(name, value)?,
            "max_body_bytes" => self.max_body_bytes = parse_value(name, value)?,
            "read_timeout_ms" => self.read_timeout_ms = parse_value(name, value)?,
            "max_source_bytes" => self.max_source_bytes = parse_value(name, value)?,
            "max_lines" => self.max_lines = parse_value(name, value)?,
            "max_line_bytes" => self.max_line_bytes = parse_value(name, value)?,
            _ => return Err(format!("unknown setting '{name}'")),
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_source_bytes: self.max_source_bytes,
            max_lines: self.max_lines,
            max_line_bytes: self.max_line_bytes,
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{name}: invalid value '{value}'"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(format!("{name}: expected on/off, got '{value}'")),
    }
}

// ── Config file lookup ────────────────────────────────────────────────────────

/// Search for the config file: `./susa-bridge.rc`, then the platform config
/// directory.  Returns the first path that exists, or `None`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    let user = directories::ProjectDirs::from("", "", "susa-bridge")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME));
    std::iter::once(local).chain(user).find(|p| p.exists())
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── /set ─────────────────────────────────────────────────────────────────────

/// Split `/set <name>=<value>` or `/set <name> <value>` into name and value.
fn parse_set(tokens: &[String]) -> Result<(String, String), String> {
    let Some(first) = tokens.first() else {
        return Err("/set: requires an argument".into());
    };

    let (name, value) = if let Some((name, value)) = first.split_once('=') {
        // `/set interpreter_args=run --fast` keeps the trailing words.
        let mut value = value.to_owned();
        for extra in &tokens[1..] {
            value.push(' ');
            value.push_str(extra);
        }
        (name.to_owned(), value)
    } else if tokens.len() >= 2 {
        (first.clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("/set: missing value for '{first}'"));
    };

    if name.is_empty() {
        return Err("/set: setting name cannot be empty".into());
    }
    Ok((name, value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("run --fast  -v"), ["run", "--fast", "-v"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#""/opt/SUSA Lang/susa" run"#), ["/opt/SUSA Lang/susa", "run"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- /set -----------------------------------------------------------------

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.socket_addr(), "127.0.0.1:8765".parse::<SocketAddr>().unwrap());
        assert_eq!(s.interpreter, "susa");
        assert_eq!(s.interpreter_args, ["run"]);
        assert!(!s.simulate_only);
        assert_eq!(s.limits(), Limits::default());
        assert_eq!(s.read_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn set_equals_syntax() {
        let (s, errs) = Settings::load_str("/set port=9000");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.port, 9000);
    }

    #[test]
    fn set_space_syntax() {
        let (s, errs) = Settings::load_str("/set bind 0.0.0.0");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn set_interpreter_args() {
        let (s, errs) = Settings::load_str("/set interpreter_args=run --strict\n/set interpreter susa-cpp");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.interpreter_args, ["run", "--strict"]);
        assert_eq!(s.interpreter, "susa-cpp");

        let (s, errs) = Settings::load_str("/set interpreter_args=");
        assert!(errs.is_empty(), "{errs:?}");
        assert!(s.interpreter_args.is_empty());
    }

    #[test]
    fn set_bool_forms() {
        for (text, want) in [("on", true), ("1", true), ("TRUE", true), ("off", false), ("0", false)] {
            let (s, errs) = Settings::load_str(&format!("/set simulate_only={text}"));
            assert!(errs.is_empty(), "{errs:?}");
            assert_eq!(s.simulate_only, want, "{text}");
        }
    }

    #[test]
    fn set_read_timeout() {
        let (s, errs) = Settings::load_str("/set read_timeout_ms 250");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.read_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn set_limits() {
        let (s, errs) = Settings::load_str("/set max_lines=50\n/set max_line_bytes=128\n/set max_source_bytes=4096");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(
            s.limits(),
            Limits {
                max_source_bytes: 4096,
                max_lines: 50,
                max_line_bytes: 128,
            }
        );
    }

    #[test]
    fn bad_values_are_reported_with_line() {
        let (s, errs) = Settings::load_str("/set port=99999\n/set port=8000\n/set nosuch=1\n/set simulate_only=maybe");
        assert_eq!(s.port, 8000);
        let lines: Vec<usize> = errs.iter().map(|e| e.line).collect();
        assert_eq!(lines, [1, 3, 4]);
        assert_eq!(errs[1].to_string(), "line 3: unknown setting 'nosuch'");
    }

    #[test]
    fn set_without_value_is_error() {
        let (_, errs) = Settings::load_str("/set port\n/set\n/set =5");
        assert_eq!(errs.len(), 3);
    }

    // -- Comments & skipping --------------------------------------------------

    #[test]
    fn comments_ignored() {
        let (s, errs) = Settings::load_str(
            ";; bridge config\n\
             # also a comment\n\
             /set port=1234",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.port, 1234);
    }

    #[test]
    fn unknown_commands_silently_skipped() {
        let (s, errs) = Settings::load_str("/echo hello\nnot a directive\n/set port=1");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.port, 1);
    }

    // -- Environment ----------------------------------------------------------

    #[test]
    fn env_overrides() {
        let mut s = Settings::default();
        let errs = s.apply_env(|var| match var {
            "SUSA_BRIDGE_PORT" => Some("9100".into()),
            "SUSA_INTERPRETER" => Some("/usr/local/bin/susa".into()),
            _ => None,
        });
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.port, 9100);
        assert_eq!(s.interpreter, "/usr/local/bin/susa");
        assert_eq!(s.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn env_errors_name_the_variable() {
        let mut s = Settings::default();
        let errs = s.apply_env(|var| (var == "SUSA_BRIDGE_BIND").then(|| "nowhere".into()));
        assert_eq!(errs, ["SUSA_BRIDGE_BIND: bind: invalid value 'nowhere'"]);
    }

    #[test]
    fn load_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"/set port=4321\n").unwrap();
        let (s, errs) = Settings::load_file(file.path()).unwrap();
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(s.port, 4321);
    }
}
