//! Per-execution variable store.
//!
//! One [`VarStore`] is created for every simulator pass and dropped with it.
//! Entries iterate in the order their names were first defined; the
//! template interpolator's textual substitutions walk the store in that
//! order, so it has to be stable for results to be reproducible.

use std::collections::HashMap;

use crate::script::value::Value;

/// Name → [`Value`] table with stable insertion order.
#[derive(Debug, Default, Clone)]
pub struct VarStore {
    index: HashMap<String, usize>,
    entries: Vec<(String, Value)>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.  Redefinition keeps the original slot.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    /// Returns `true` if the variable is set.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate over all variables in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Iterate over the integer and float variables, in definition order.
    pub fn numeric(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter(|(_, value)| value.is_numeric())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
