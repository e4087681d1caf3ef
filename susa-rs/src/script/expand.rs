//! Template string interpolation (`rt"…"` bodies).
//!
//! Resolution runs in two stages over the whole template:
//!
//! | Stage | Sequence        | Meaning                                          |
//! |-------|-----------------|--------------------------------------------------|
//! | 1     | `{name}`        | Replaced by the stringified variable `name`      |
//! | 2     | `{expr}`        | Numeric variables substituted into `expr`, then  |
//! |       |                 | evaluated if it passes the arithmetic allow-list |
//!
//! Placeholders that neither stage can resolve are left exactly as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use super::expr::{eval_arith, passes_gate};
use crate::var::VarStore;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex is valid"));

/// Interpolation would produce more than `limit` bytes.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expanded template exceeds {limit} bytes")]
pub struct ExpansionTooLarge {
    pub limit: usize,
}

/// Resolve every placeholder in `template` against `vars`.
///
/// Fails only if the text would grow beyond `limit` bytes; the check runs
/// before each substitution, so an oversized result is never built.
pub fn interpolate(template: &str, vars: &VarStore, limit: usize) -> Result<String, ExpansionTooLarge> {
    let mut text = template.to_owned();

    for (name, value) in vars.iter() {
        let key = format!("{{{name}}}");
        let hits = text.matches(&key).count();
        if hits == 0 {
            continue;
        }
        let value = value.to_string();
        let grown = (text.len() - hits * key.len()).saturating_add(hits.saturating_mul(value.len()));
        if grown > limit {
            return Err(ExpansionTooLarge { limit });
        }
        text = text.replace(&key, &value);
    }

    let text = PLACEHOLDER
        .replace_all(&text, |caps: &Captures| {
            eval_placeholder(&caps[1], vars, limit).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned();
    if text.len() > limit {
        return Err(ExpansionTooLarge { limit });
    }
    Ok(text)
}

/// Stage 2 for a single `{…}` body.  `None` leaves the placeholder alone.
fn eval_placeholder(expr: &str, vars: &VarStore, limit: usize) -> Option<String> {
    let mut candidate = expr.to_owned();
    for (name, value) in vars.numeric() {
        candidate = candidate.replace(name, &value.to_string());
        if candidate.len() > limit {
            return None;
        }
    }
    if !passes_gate(&candidate) {
        tracing::trace!(expr, candidate = %candidate, "placeholder rejected by allow-list");
        return None;
    }
    match eval_arith(&candidate) {
        Ok(v) => Some(v.to_string()),
        Err(e) => {
            tracing::trace!(expr, error = %e, "placeholder left unresolved");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::value::Value;

    fn expand(template: &str, vars: &VarStore) -> String {
        interpolate(template, vars, 1024).expect("within limit")
    }

    fn vars(pairs: &[(&str, Value)]) -> VarStore {
        let mut store = VarStore::new();
        for (name, value) in pairs {
            store.set(*name, value.clone());
        }
        store
    }

    #[test]
    fn direct_substitution() {
        let v = vars(&[("name", Value::Str("SUSA".into())), ("version", Value::Float(1.0))]);
        assert_eq!(expand("Language: {name} v{version}", &v), "Language: SUSA v1.0");
    }

    #[test]
    fn numbers_keep_their_subtype() {
        assert_eq!(expand("{n}", &vars(&[("n", Value::Float(3.5))])), "3.5");
        assert_eq!(expand("{n}", &vars(&[("n", Value::Int(3))])), "3");
    }

    #[test]
    fn lists_and_scalars_stringify() {
        let v = vars(&[
            ("xs", Value::List(vec!["a".into(), "b".into()])),
            ("ok", Value::Bool(false)),
            ("nothing", Value::Null),
        ]);
        assert_eq!(expand("{xs} {ok} {nothing}", &v), "[a, b] false null");
    }

    #[test]
    fn pure_arithmetic() {
        let v = VarStore::new();
        assert_eq!(expand("{2+2}", &v), "4");
        assert_eq!(expand("sum={1 + 2 * 3}!", &v), "sum=7!");
        assert_eq!(expand("{7 / 2}", &v), "3.5");
    }

    #[test]
    fn arithmetic_with_variables() {
        let v = vars(&[("a", Value::Int(5)), ("b", Value::Float(2.5))]);
        assert_eq!(expand("{a + b}", &v), "7.5");
        assert_eq!(expand("{a * 2}", &v), "10");
    }

    #[test]
    fn unknown_identifier_left_verbatim() {
        let v = vars(&[("a", Value::Int(1))]);
        assert_eq!(expand("{x}", &v), "{x}");
        assert_eq!(expand("{a + x}", &v), "{a + x}");
    }

    #[test]
    fn non_numeric_variables_are_not_substituted_into_expressions() {
        let v = vars(&[("s", Value::Str("1".into()))]);
        assert_eq!(expand("{s + 1}", &v), "{s + 1}");
    }

    #[test]
    fn evaluation_errors_leave_placeholder() {
        let v = VarStore::new();
        assert_eq!(expand("{1/0}", &v), "{1/0}");
        assert_eq!(expand("{2 3}", &v), "{2 3}");
        assert_eq!(expand("{ }", &v), "{ }");
    }

    #[test]
    fn empty_braces_untouched() {
        assert_eq!(expand("a{}b", &VarStore::new()), "a{}b");
    }

    #[test]
    fn code_like_placeholders_never_evaluated() {
        let v = VarStore::new();
        let src = "{__import__('os').system('id')}";
        assert_eq!(expand(src, &v), src);
    }

    #[test]
    fn substitution_follows_definition_order() {
        // `n` is substituted before `nn`, so `{nn + 1}` sees `n` replaced
        // inside `nn` first.
        let v = vars(&[("n", Value::Int(1)), ("nn", Value::Int(2))]);
        assert_eq!(expand("{nn + 1}", &v), "12");
        let v = vars(&[("nn", Value::Int(2)), ("n", Value::Int(1))]);
        assert_eq!(expand("{nn + 1}", &v), "3");
    }

    /// Digit-named variables can feed each other; the expression is
    /// abandoned once it outgrows the limit.
    #[test]
    fn runaway_numeric_substitution_is_abandoned() {
        let mut v = VarStore::new();
        // "1" -> "2222222222", "2" -> "3333333333", ...
        for d in 1..=8i64 {
            v.set(d.to_string(), Value::Int((d + 1) * 1_111_111_111));
        }
        assert_eq!(interpolate("{1 + 1}", &v, 1024), Ok("{1 + 1}".to_owned()));
    }

    #[test]
    fn stage_two_sees_stage_one_output() {
        let v = vars(&[("t", Value::Str("{1+1}".into()))]);
        assert_eq!(expand("{t}", &v), "2");
    }

    #[test]
    fn growth_beyond_limit_is_refused() {
        let v = vars(&[("a", Value::Str("x".repeat(100)))]);
        assert_eq!(interpolate("{a}{a}", &v, 150), Err(ExpansionTooLarge { limit: 150 }));
        assert_eq!(interpolate("{a}", &v, 150).map(|s| s.len()), Ok(100));
        assert!(interpolate("abcdef", &VarStore::new(), 3).is_err());
    }
}
