//! Rule evaluation over a reconciled patient snapshot.

use careflag_core::{
    Alert, Catalog, Comparator, FieldValue, PatientSnapshot, Predicate, RuleDefinition,
    ValidationError,
};
use chrono::NaiveDate;

/// Inputs a rule may depend on besides the snapshot itself.
///
/// The engine never reads the wall clock; date-based rules only apply when
/// `today` is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    pub today: Option<NaiveDate>,
}

impl EvaluationContext {
    pub fn on(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }
}

/// Evaluates every catalog rule against a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> RuleEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Alerts for every rule that definitely holds, in catalog order.
    ///
    /// Missing or ill-typed fields make a rule not apply; they never abort
    /// the evaluation.
    pub fn evaluate(&self, snapshot: &PatientSnapshot, context: &EvaluationContext) -> Vec<Alert> {
        let alerts: Vec<Alert> = self
            .catalog
            .rules()
            .iter()
            .filter(|rule| self.fires(rule, snapshot, context))
            .map(Alert::from_rule)
            .collect();

        tracing::debug!(
            rules = self.catalog.rules().len(),
            fired = alerts.len(),
            fields = snapshot.len(),
            "snapshot evaluated"
        );
        alerts
    }

    fn fires(
        &self,
        rule: &RuleDefinition,
        snapshot: &PatientSnapshot,
        context: &EvaluationContext,
    ) -> bool {
        let fired = self.applies(&rule.id, &rule.when, snapshot, context) == Some(true);
        if fired {
            tracing::debug!(rule = %rule.id, severity = %rule.severity, "rule fired");
        }
        fired
    }

    /// Three-valued: `None` means the predicate does not apply.
    fn applies(
        &self,
        rule_id: &str,
        predicate: &Predicate,
        snapshot: &PatientSnapshot,
        context: &EvaluationContext,
    ) -> Option<bool> {
        match predicate {
            Predicate::All { of } => {
                let outcomes: Vec<_> = of
                    .iter()
                    .map(|inner| self.applies(rule_id, inner, snapshot, context))
                    .collect();
                if outcomes.contains(&Some(false)) {
                    Some(false)
                } else if outcomes.contains(&None) {
                    None
                } else {
                    Some(true)
                }
            }
            Predicate::Any { of } => {
                let outcomes: Vec<_> = of
                    .iter()
                    .map(|inner| self.applies(rule_id, inner, snapshot, context))
                    .collect();
                if outcomes.contains(&Some(true)) {
                    Some(true)
                } else if outcomes.contains(&None) {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::Not { predicate } => self
                .applies(rule_id, predicate, snapshot, context)
                .map(|outcome| !outcome),
            leaf => match self.check_leaf(leaf, snapshot, context) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::debug!(rule = %rule_id, error = %err, "rule does not apply");
                    None
                }
            },
        }
    }

    fn check_leaf(
        &self,
        predicate: &Predicate,
        snapshot: &PatientSnapshot,
        context: &EvaluationContext,
    ) -> Result<Option<bool>, ValidationError> {
        let outcome = match predicate {
            Predicate::Compare { field, op, value } => snapshot
                .number(field)?
                .map(|actual| op.holds(actual, *value)),
            Predicate::Status {
                metric,
                field,
                statuses,
            } => {
                let field = field.as_deref().unwrap_or(metric.as_str());
                snapshot.get(field).map(|value| {
                    let status = self.catalog.classify(metric, value);
                    statuses.contains(&status)
                })
            }
            Predicate::Equals { field, value } => match snapshot.get(field) {
                Some(actual) => Some(categorical_match(field, actual, value)?),
                None => None,
            },
            Predicate::OneOf { field, values } => snapshot
                .text(field)?
                .map(|actual| values.iter().any(|candidate| candidate == actual)),
            Predicate::IsTrue { field } => snapshot.flag(field)?,
            Predicate::Contains { field, value } => match snapshot.get(field) {
                Some(actual) => Some(selection_contains(field, actual, value)?),
                None => None,
            },
            Predicate::YearsSince { field, op, years } => {
                let Some(today) = context.today else {
                    return Ok(None);
                };
                snapshot
                    .date(field)?
                    .and_then(|date| today.years_since(date))
                    .map(|elapsed| op.holds(f64::from(elapsed), f64::from(*years)))
            }
            Predicate::Bmi {
                op,
                value,
                weight_field,
                height_field,
            } => {
                let (Some(weight), Some(height)) =
                    (snapshot.number(weight_field)?, snapshot.number(height_field)?)
                else {
                    return Ok(None);
                };
                if height <= 0.0 {
                    return Err(ValidationError::new(
                        height_field,
                        "a positive height",
                        &FieldValue::Number(height),
                    ));
                }
                let metres = height / 100.0;
                Some(op.holds(weight / (metres * metres), *value))
            }
            Predicate::All { .. } | Predicate::Any { .. } | Predicate::Not { .. } => None,
        };
        Ok(outcome)
    }
}

fn categorical_match(
    field: &str,
    actual: &FieldValue,
    expected: &FieldValue,
) -> Result<bool, ValidationError> {
    match expected {
        FieldValue::Number(expected) => actual
            .as_number()
            .filter(|number| number.is_finite())
            .map(|number| Comparator::Eq.holds(number, *expected))
            .ok_or_else(|| ValidationError::new(field, "a finite number", actual)),
        FieldValue::Text(expected) => actual
            .as_text()
            .map(|text| text == expected)
            .ok_or_else(|| ValidationError::new(field, "text", actual)),
        FieldValue::Flag(expected) => actual
            .as_flag()
            .map(|flag| flag == *expected)
            .ok_or_else(|| ValidationError::new(field, "a boolean", actual)),
        FieldValue::List(expected) => actual
            .as_list()
            .map(|items| same_selection(items, expected))
            .ok_or_else(|| ValidationError::new(field, "a list", actual)),
    }
}

/// Order-insensitive comparison of two multiselect values.
pub(crate) fn same_selection(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<_> = a.iter().map(String::as_str).collect();
    let mut b: Vec<_> = b.iter().map(String::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Membership in a multiselect. A single text entry counts as a
/// one-item selection.
fn selection_contains(
    field: &str,
    actual: &FieldValue,
    wanted: &str,
) -> Result<bool, ValidationError> {
    match actual {
        FieldValue::List(items) => Ok(items.iter().any(|item| item.trim() == wanted)),
        FieldValue::Text(text) => Ok(text.trim() == wanted),
        other => Err(ValidationError::new(field, "a list", other)),
    }
}

/// Stable re-order for display: HIGH first, declaration order within a
/// severity.
pub fn sort_by_severity(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
}
