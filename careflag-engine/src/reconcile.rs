//! Reconciliation of form-entered values against values extracted from a
//! lab report.
//!
//! Every field is tracked by a small state machine:
//!
//! ```text
//! Agreed ──(form edit disagrees)──> Pending ──resolve──> Resolved
//!                                      ^                    │
//!                                      └──(form edit)───────┘
//! ```
//!
//! A pending field is withheld from the merged snapshot so that rule
//! evaluation never sees either of the disputed values.

use std::collections::{BTreeMap, BTreeSet};

use careflag_core::{
    Choice, Conflict, DocumentValue, EngineConfig, FieldValue, LabReport, PatientSnapshot,
};
use serde::{Deserialize, Serialize};

/// Which source supplied an agreed value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Form,
    Document,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldState {
    Agreed {
        value: FieldValue,
        provenance: Provenance,
    },
    Pending {
        conflict: Conflict,
    },
    Resolved {
        conflict: Conflict,
    },
}

impl FieldState {
    /// The value evaluation may use; `None` while a conflict is pending.
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            FieldState::Agreed { value, .. } => Some(value),
            FieldState::Pending { .. } => None,
            FieldState::Resolved { conflict } => conflict.chosen_value(),
        }
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            FieldState::Agreed { .. } => None,
            FieldState::Pending { conflict } | FieldState::Resolved { conflict } => Some(conflict),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FieldState::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("field `{0}` has no conflict to resolve")]
    NoConflict(String),
}

/// Outcome of one merge, plus every later resolution and form edit.
///
/// A new merge always starts from scratch: resolutions from an earlier
/// merge are never carried over.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    tolerance: f64,
    form: PatientSnapshot,
    document: LabReport,
    fields: BTreeMap<String, FieldState>,
}

impl Reconciliation {
    pub fn merge(form: &PatientSnapshot, document: &LabReport, config: &EngineConfig) -> Self {
        let mut reconciliation = Self {
            tolerance: config.numeric_tolerance,
            form: form.clone(),
            document: document.clone(),
            fields: BTreeMap::new(),
        };

        let names: BTreeSet<String> = form
            .iter()
            .map(|(name, _)| name.to_string())
            .chain(document.keys().cloned())
            .collect();
        for name in names {
            reconciliation.settle(name);
        }

        let (mut adopted, mut agreed, mut conflicts) = (0usize, 0usize, 0usize);
        for state in reconciliation.fields.values() {
            match state {
                FieldState::Agreed {
                    provenance: Provenance::Document,
                    ..
                } => adopted += 1,
                FieldState::Agreed {
                    provenance: Provenance::Both,
                    ..
                } => agreed += 1,
                FieldState::Pending { .. } => conflicts += 1,
                _ => {}
            }
        }
        tracing::info!(
            form_fields = form.len(),
            document_fields = document.len(),
            adopted,
            agreed,
            conflicts,
            "sources merged"
        );

        reconciliation
    }

    /// Re-derive the state of one field from the stored sources.
    fn settle(&mut self, name: String) {
        let form = self.form.get(&name).filter(|value| !value.is_blank());
        let document = self.document.get(&name);

        let state = match (form, document) {
            (Some(value), None) => FieldState::Agreed {
                value: value.clone(),
                provenance: Provenance::Form,
            },
            (None, Some(reading)) => FieldState::Agreed {
                value: reading.value.clone(),
                provenance: Provenance::Document,
            },
            (Some(value), Some(reading)) if values_agree(value, &reading.value, self.tolerance) => {
                FieldState::Agreed {
                    value: value.clone(),
                    provenance: Provenance::Both,
                }
            }
            (Some(value), Some(reading)) => FieldState::Pending {
                conflict: conflict_for(&name, value, reading),
            },
            (None, None) => match self.form.get(&name) {
                // blank form entry with nothing extracted
                Some(blank) => FieldState::Agreed {
                    value: blank.clone(),
                    provenance: Provenance::Form,
                },
                None => {
                    self.fields.remove(&name);
                    return;
                }
            },
        };
        self.fields.insert(name, state);
    }

    /// Authoritative view: agreed and resolved values, pending fields absent.
    pub fn snapshot(&self) -> PatientSnapshot {
        self.fields
            .iter()
            .filter_map(|(name, state)| state.value().map(|value| (name.clone(), value.clone())))
            .collect()
    }

    /// Every conflict from this merge, pending or resolved, in field order.
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.fields
            .values()
            .filter_map(FieldState::conflict)
            .cloned()
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Conflict> {
        self.fields
            .values()
            .filter(|state| state.is_pending())
            .filter_map(FieldState::conflict)
    }

    pub fn has_pending(&self) -> bool {
        self.fields.values().any(FieldState::is_pending)
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, &FieldState)> {
        self.fields.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn form(&self) -> &PatientSnapshot {
        &self.form
    }

    pub fn document(&self) -> &LabReport {
        &self.document
    }

    /// Apply a user decision to the conflict on `field`.
    ///
    /// Idempotent; choosing again with a different option replaces the
    /// earlier decision.
    pub fn resolve(
        &mut self,
        field: &str,
        choice: Choice,
    ) -> Result<PatientSnapshot, ReconcileError> {
        let state = self
            .fields
            .get_mut(field)
            .ok_or_else(|| ReconcileError::NoConflict(field.to_string()))?;

        let conflict = match state {
            FieldState::Pending { conflict } | FieldState::Resolved { conflict } => conflict,
            FieldState::Agreed { .. } => return Err(ReconcileError::NoConflict(field.to_string())),
        };
        conflict.resolution = choice.into();
        let conflict = conflict.clone();
        tracing::info!(field, resolution = ?conflict.resolution, "conflict resolved");
        *state = FieldState::Resolved { conflict };

        Ok(self.snapshot())
    }

    /// Change one form value after the merge. Only that field is
    /// re-derived, so a new disagreement surfaces as a new pending conflict.
    pub fn update_form(&mut self, field: &str, value: Option<FieldValue>) {
        match value {
            Some(value) => {
                self.form.insert(field, value);
            }
            None => {
                self.form.remove(field);
            }
        }
        self.settle(field.to_string());
    }
}

fn conflict_for(name: &str, form: &FieldValue, reading: &DocumentValue) -> Conflict {
    Conflict::new(name, form.clone(), reading.value.clone(), reading.unit.clone())
}

/// Type-appropriate equality: numbers within `tolerance` (exclusive),
/// exact text, exact booleans. Mixed kinds never agree.
pub fn values_agree(form: &FieldValue, document: &FieldValue, tolerance: f64) -> bool {
    match (form, document) {
        (FieldValue::Flag(a), FieldValue::Flag(b)) => a == b,
        (FieldValue::Text(a), FieldValue::Text(b)) if a == b => true,
        (FieldValue::List(a), FieldValue::List(b)) => crate::rules::same_selection(a, b),
        (FieldValue::Flag(_), _) | (_, FieldValue::Flag(_)) => false,
        (FieldValue::List(_), _) | (_, FieldValue::List(_)) => false,
        _ => match (form.as_number(), document.as_number()) {
            (Some(a), Some(b)) => (a - b).abs() < tolerance || a == b,
            _ => false,
        },
    }
}

/// Merge a form snapshot with an extracted lab report.
///
/// Returns the merged snapshot, with every disputed field absent, and one
/// unresolved conflict per disputed field.
pub fn merge(
    form: &PatientSnapshot,
    document: &LabReport,
    config: &EngineConfig,
) -> (PatientSnapshot, Vec<Conflict>) {
    let reconciliation = Reconciliation::merge(form, document, config);
    (reconciliation.snapshot(), reconciliation.conflicts())
}

/// Record `choice` on `conflict` and return `snapshot` with the chosen value
/// applied to that single field.
pub fn resolve(
    snapshot: &PatientSnapshot,
    conflict: &mut Conflict,
    choice: Choice,
) -> PatientSnapshot {
    conflict.resolution = choice.into();
    let mut updated = snapshot.clone();
    if let Some(value) = conflict.chosen_value() {
        updated.insert(conflict.field_name.clone(), value.clone());
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_agree_within_tolerance() {
        let a = FieldValue::Number(5.6);
        assert!(values_agree(&a, &FieldValue::Number(5.62), 0.05));
        assert!(!values_agree(&a, &FieldValue::Number(5.7), 0.05));
        assert!(values_agree(&a, &FieldValue::Text("5.6".into()), 0.05));
    }

    #[test]
    fn zero_tolerance_is_exact() {
        let a = FieldValue::Number(8.2);
        assert!(values_agree(&a, &FieldValue::Number(8.2), 0.0));
        assert!(!values_agree(&a, &FieldValue::Number(8.21), 0.0));
    }

    #[test]
    fn categorical_values_match_exactly() {
        let a = FieldValue::Text("Type 2".into());
        assert!(values_agree(&a, &FieldValue::Text("Type 2".into()), 0.05));
        assert!(!values_agree(&a, &FieldValue::Text("type 2".into()), 0.05));
        assert!(!values_agree(&FieldValue::Flag(true), &FieldValue::Number(1.0), 0.05));
    }

    #[test]
    fn selections_agree_regardless_of_order() {
        let form = FieldValue::from(&["Metformin", "Gliclazide"][..]);
        assert!(values_agree(
            &form,
            &FieldValue::from(&["Gliclazide", "Metformin"][..]),
            0.05
        ));
        assert!(!values_agree(&form, &FieldValue::from(&["Metformin"][..]), 0.05));
        assert!(!values_agree(&form, &FieldValue::Text("Metformin".into()), 0.05));
    }

    #[test]
    fn nan_never_agrees() {
        let nan = FieldValue::Number(f64::NAN);
        assert!(!values_agree(&nan, &nan, 0.05));
    }
}
