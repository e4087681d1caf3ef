//! Runtime values and literal type inference for the SUSA simulator.
//!
//! A `let` right-hand side is classified by [`infer`], which walks a fixed,
//! ordered table of `(predicate, constructor)` rules and stops at the first
//! predicate that matches.  There is no backtracking: once a token *looks*
//! numeric it is converted as a number, and a failed conversion is an error
//! rather than a fall-through to the later rules.

use std::fmt;

use thiserror::Error;

/// A simulator runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    Null,
    /// List elements are kept as the (unquoted) text of each item.
    List(Vec<String>),
    /// Anything no rule recognised; printed back verbatim.
    Raw(String),
}

/// A literal matched a rule but could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("invalid integer literal `{0}`")]
    InvalidInt(String),
    #[error("invalid float literal `{0}`")]
    InvalidFloat(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Raw(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl Value {
    /// `true` for `Int` and `Float`: the only values the template
    /// arithmetic pass substitutes into expressions.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Name of the type, used in debug logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Float(_) => "float",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Raw(_) => "raw",
        }
    }
}

/// Render a float the way the language prints it: shortest round-trip
/// digits, a trailing `.0` on integral values, and exponent notation for
/// very large or very small magnitudes (`1e+16`, `1e-05`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        return exponent_form(x);
    }
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn exponent_form(x: f64) -> String {
    // `{:e}` yields e.g. "1.5e-7"; the exponent needs an explicit sign and
    // at least two digits.
    let s = format!("{x:e}");
    let Some((mantissa, exp)) = s.split_once('e') else {
        return s;
    };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

// ── Inference ─────────────────────────────────────────────────────────────────

type Rule = (fn(&str) -> bool, fn(&str) -> Result<Value, ValueError>);

/// Inference rules in priority order.
const RULES: &[Rule] = &[
    (is_string, string_literal),
    (is_template, template_literal),
    (is_list, list_literal),
    (is_numeric_shape, number_literal),
    (is_bool, bool_literal),
    (is_null, null_literal),
];

/// Classify a trimmed literal token.
///
/// ```rust
/// use susa_bridge::script::value::{infer, Value};
///
/// assert_eq!(infer("3.5"), Ok(Value::Float(3.5)));
/// assert_eq!(infer("\"hi\""), Ok(Value::Str("hi".into())));
/// assert_eq!(infer("maybe"), Ok(Value::Raw("maybe".into())));
/// ```
pub fn infer(token: &str) -> Result<Value, ValueError> {
    for (matches, build) in RULES {
        if matches(token) {
            return build(token);
        }
    }
    Ok(Value::Raw(token.to_owned()))
}

/// Strip `prefix` and a trailing `"` from `token`.
///
/// Returns `None` unless `token` starts with `prefix` and ends with `"`.
/// When the two overlap (a lone `"`, or a bare `rt"`) the body is empty.
pub fn unwrap_quoted<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    if !token.starts_with(prefix) || !token.ends_with('"') {
        return None;
    }
    Some(token.get(prefix.len()..token.len() - 1).unwrap_or(""))
}

fn is_string(token: &str) -> bool {
    unwrap_quoted(token, "\"").is_some()
}

fn string_literal(token: &str) -> Result<Value, ValueError> {
    Ok(Value::Str(unwrap_quoted(token, "\"").unwrap_or_default().to_owned()))
}

fn is_template(token: &str) -> bool {
    unwrap_quoted(token, "rt\"").is_some()
}

fn template_literal(token: &str) -> Result<Value, ValueError> {
    Ok(Value::Str(unwrap_quoted(token, "rt\"").unwrap_or_default().to_owned()))
}

fn is_list(token: &str) -> bool {
    token.starts_with('[') && token.ends_with(']')
}

fn list_literal(token: &str) -> Result<Value, ValueError> {
    let inner = token.get(1..token.len() - 1).unwrap_or("");
    if inner.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    let items = inner
        .split(',')
        .map(|item| {
            let item = item.trim();
            let item = item.strip_prefix('"').unwrap_or(item);
            item.strip_suffix('"').unwrap_or(item).to_owned()
        })
        .collect();
    Ok(Value::List(items))
}

/// Lax numeric check: with every `.` and `-` removed, what remains must be
/// a non-empty run of ASCII digits.  `1-2-3` and `1.2.3` pass.
pub fn is_numeric_shape(token: &str) -> bool {
    let mut digits = token.chars().filter(|c| !matches!(c, '.' | '-')).peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}

/// Integers are `i64`; a token outside that range is an `InvalidInt` and
/// the declaration holding it is dropped.
fn number_literal(token: &str) -> Result<Value, ValueError> {
    if token.contains('.') {
        token
            .parse()
            .map(Value::Float)
            .map_err(|_| ValueError::InvalidFloat(token.to_owned()))
    } else {
        token
            .parse()
            .map(Value::Int)
            .map_err(|_| ValueError::InvalidInt(token.to_owned()))
    }
}

fn is_bool(token: &str) -> bool {
    token.eq_ignore_ascii_case("true") || token.eq_ignore_ascii_case("false")
}

fn bool_literal(token: &str) -> Result<Value, ValueError> {
    Ok(Value::Bool(token.eq_ignore_ascii_case("true")))
}

fn is_null(token: &str) -> bool {
    token.eq_ignore_ascii_case("null")
}

fn null_literal(_token: &str) -> Result<Value, ValueError> {
    Ok(Value::Null)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
