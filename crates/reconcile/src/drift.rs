//! Field-level comparison of desired and observed specs.

use crate::element::{ElementSet, SetDiff, TypedElement};
use std::fmt;

/// One field that differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.from, self.to)
    }
}

/// Accumulates changes field by field.
#[derive(Debug, Default)]
pub(crate) struct Drift {
    changes: Vec<FieldChange>,
}

impl Drift {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn value<T: PartialEq + fmt::Display>(
        &mut self,
        field: &'static str,
        current: &T,
        desired: &T,
    ) -> &mut Self {
        if current != desired {
            self.changes.push(FieldChange {
                field,
                from: current.to_string(),
                to: desired.to_string(),
            });
        }
        self
    }

    /// Compare string lists ignoring order and repetition.
    pub(crate) fn list(
        &mut self,
        field: &'static str,
        current: &[String],
        desired: &[String],
    ) -> &mut Self {
        let normalize = |items: &[String]| {
            let mut items: Vec<String> = items.to_vec();
            items.sort();
            items.dedup();
            items
        };
        let (current, desired) = (normalize(current), normalize(desired));
        if current != desired {
            self.changes.push(FieldChange {
                field,
                from: format!("[{}]", current.join(", ")),
                to: format!("[{}]", desired.join(", ")),
            });
        }
        self
    }

    /// Compare element sets by identity. Unset and empty are equal.
    pub(crate) fn set(
        &mut self,
        field: &'static str,
        current: Option<&ElementSet>,
        desired: Option<&ElementSet>,
    ) -> &mut Self {
        let empty = ElementSet::new();
        let diff = SetDiff::between(current.unwrap_or(&empty), desired.unwrap_or(&empty));
        if !diff.is_empty() {
            let render = |sign: char, elements: &[TypedElement]| {
                elements
                    .iter()
                    .map(|e| format!("{sign}{}:{}", e.element_type, e.value))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            self.changes.push(FieldChange {
                field,
                from: render('-', &diff.removed),
                to: render('+', &diff.added),
            });
        }
        self
    }

    /// Like [`Drift::set`], but an unset desired value means the manager
    /// picks it, so whatever it holds is accepted.
    pub(crate) fn computed_set(
        &mut self,
        field: &'static str,
        current: Option<&ElementSet>,
        desired: Option<&ElementSet>,
    ) -> &mut Self {
        match desired {
            Some(desired) => self.set(field, current, Some(desired)),
            None => self,
        }
    }

    pub(crate) fn finish(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.changes)
    }
}
