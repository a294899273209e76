//! Core data model for clinical alerting and source reconciliation.
//!
//! This crate holds the shapes shared by every other crate in the
//! workspace: patient snapshots, the threshold catalog, conflicts and the
//! traffic-light classifier. It performs no I/O.

mod catalog;
mod conflict;
mod error;
mod traffic;
mod value;

use serde::{Deserialize, Serialize};

pub use catalog::{
    Bound, Catalog, CatalogDocument, Comparator, Direction, MetricDefinition, Predicate,
    RuleDefinition,
};
pub use conflict::{Choice, Conflict, ParseChoiceError, Resolution};
pub use error::{ConfigError, ValidationError};
pub use traffic::{classify, TrafficLightStatus};
pub use value::{DocumentValue, FieldValue, LabReport, PatientSnapshot};

/// Tunables that live outside the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Largest absolute difference at which two numeric readings still agree (exclusive).
    pub numeric_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: 0.05,
        }
    }
}

/// Severity attached to a rule. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fired rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub rule_id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Alert {
    pub fn from_rule(rule: &RuleDefinition) -> Self {
        Self {
            rule_id: rule.id.clone(),
            title: rule.title.clone(),
            message: rule.message.clone(),
            severity: rule.severity,
        }
    }
}
