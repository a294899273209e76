use std::path::PathBuf;

use crate::FieldValue;

/// Malformed or inconsistent threshold catalog. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("catalog is not valid: {0}")]
    Parse(String),
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metric `{metric}`: {reason}")]
    InvalidMetric { metric: String, reason: String },
    #[error("metric `{0}` is defined more than once")]
    DuplicateMetric(String),
    #[error("rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("rule `{rule}` references unknown metric `{metric}`")]
    UnknownMetric { rule: String, metric: String },
    #[error("cannot serialize catalog: {0}")]
    Serialize(String),
}

/// A snapshot value does not have the type a predicate needs.
///
/// Never escapes rule evaluation: the predicate that hits it simply does
/// not apply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field `{field}` expected {expected}, found {found}")]
pub struct ValidationError {
    pub field: String,
    pub expected: &'static str,
    pub found: String,
}

impl ValidationError {
    pub fn new(field: &str, expected: &'static str, found: &FieldValue) -> Self {
        Self {
            field: field.to_string(),
            expected,
            found: format!("{} `{found}`", found.kind()),
        }
    }
}
