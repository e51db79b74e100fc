//! Per-statement parameter binding tracker.
//!
//! A [`Bindings`] value lives inside one spied statement and records what the
//! caller bound, keyed by 1-based position or by name. Later binds to the same
//! identifier replace earlier ones. [`Bindings::snapshot`] copies the current
//! state for rendering; snapshots never change afterwards.

use crate::value::{SqlType, SqlValue};
use std::collections::BTreeMap;
use std::fmt;


/// Identifier of a bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamId {
    /// 1-based position.
    Position(usize),
    /// Procedure parameter name (case-sensitive).
    Name(String),
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Position(i) => write!(f, "{i}"),
            ParamId::Name(n) => f.write_str(n),
        }
    }
}

/// What is known about one parameter slot.
///
/// A slot can carry an input value, an OUT registration, or both (INOUT).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Binding {
    pub value: Option<SqlValue>,
    pub out: Option<SqlType>,
}

impl Binding {
    /// Slot registered as OUT without an input value.
    pub fn is_out_only(&self) -> bool {
        self.value.is_none() && self.out.is_some()
    }
}

/// Live binding state of one statement.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    positional: BTreeMap<usize, Binding>,
    named: BTreeMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` at 1-based `index`. Index 0 is ignored and returns `false`;
    /// the delegate owns range validation.
    pub fn set_positional(&mut self, index: usize, value: SqlValue) -> bool {
        if index == 0 {
            return false;
        }
        self.positional.entry(index).or_default().value = Some(value);
        true
    }

    /// Record `value` for the parameter called `name`.
    pub fn set_named(&mut self, name: &str, value: SqlValue) {
        self.slot_named(name).value = Some(value);
    }

    /// Mark 1-based `index` as an OUT parameter.
    pub fn register_out(&mut self, index: usize, sql_type: SqlType) -> bool {
        if index == 0 {
            return false;
        }
        self.positional.entry(index).or_default().out = Some(sql_type);
        true
    }

    pub fn register_named_out(&mut self, name: &str, sql_type: SqlType) {
        self.slot_named(name).out = Some(sql_type);
    }

    fn slot_named(&mut self, name: &str) -> &mut Binding {
        self.named.entry(name.to_string()).or_default()
    }

    /// Forget every binding and OUT registration.
    pub fn clear(&mut self) {
        self.positional.clear();
        self.named.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Number of identifiers with a binding or registration.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Copy the current state into an immutable snapshot.
    pub fn snapshot(&self) -> BindingSnapshot {
        BindingSnapshot {
            positional: self.positional.clone(),
            named: self.named.clone(),
        }
    }
}

/// Immutable view of a statement's bindings at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSnapshot {
    positional: BTreeMap<usize, Binding>,
    named: BTreeMap<String, Binding>,
}

impl BindingSnapshot {
    pub fn positional(&self, index: usize) -> Option<&Binding> {
        self.positional.get(&index)
    }

    pub fn named(&self, name: &str) -> Option<&Binding> {
        self.named.get(name)
    }

    /// Positional slots in ascending index order.
    pub fn iter_positional(&self) -> impl Iterator<Item = (usize, &Binding)> {
        self.positional.iter().map(|(i, b)| (*i, b))
    }

    /// Named slots in name order.
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.named.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn has_named(&self) -> bool {
        !self.named.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Every slot, positional first, as `(id, binding)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (ParamId, &Binding)> {
        self.iter_positional()
            .map(|(i, b)| (ParamId::Position(i), b))
            .chain(self.iter_named().map(|(n, b)| (ParamId::Name(n.to_string()), b)))
    }
}
