//! Threshold catalog: metric boundaries and declarative rules.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConfigError, FieldValue, Severity, TrafficLightStatus};

/// Which side of the scale is clinically worse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    HigherIsWorse,
    LowerIsWorse,
}

/// A band boundary. `Unbounded` means the band never ends: +∞ for
/// `higher_is_worse`, −∞ for `lower_is_worse`.
///
/// Serialized as a JSON number or the string `"inf"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawBound", into = "RawBound")]
pub enum Bound {
    At(f64),
    Unbounded,
}

impl Bound {
    /// Position of the bound on the real line for the given direction.
    pub fn limit(self, direction: Direction) -> f64 {
        match (self, direction) {
            (Bound::At(value), _) => value,
            (Bound::Unbounded, Direction::HigherIsWorse) => f64::INFINITY,
            (Bound::Unbounded, Direction::LowerIsWorse) => f64::NEG_INFINITY,
        }
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Bound::At(value)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawBound {
    Number(f64),
    Text(String),
}

impl TryFrom<RawBound> for Bound {
    type Error = String;

    fn try_from(raw: RawBound) -> Result<Self, Self::Error> {
        match raw {
            RawBound::Number(value) if value.is_finite() => Ok(Bound::At(value)),
            RawBound::Number(value) => Err(format!("bound {value} is not finite")),
            RawBound::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" | "unbounded" => Ok(Bound::Unbounded),
                _ => Err(format!("expected a number or \"inf\", found {text:?}")),
            },
        }
    }
}

impl From<Bound> for RawBound {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::At(value) => RawBound::Number(value),
            Bound::Unbounded => RawBound::Text("inf".to_string()),
        }
    }
}

/// Traffic-light boundaries for one metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub green_max: Bound,
    pub amber_max: Bound,
    #[serde(default)]
    pub direction: Direction,
}

impl MetricDefinition {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidMetric {
            metric: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }

        let green = self.green_max.limit(self.direction);
        let amber = self.amber_max.limit(self.direction);
        match self.direction {
            Direction::HigherIsWorse if green > amber => Err(invalid(format!(
                "green_max ({green}) exceeds amber_max ({amber})"
            ))),
            Direction::LowerIsWorse if green < amber => Err(invalid(format!(
                "green_max ({green}) is below amber_max ({amber}) for a lower_is_worse metric"
            ))),
            _ => Ok(()),
        }
    }
}

/// Numeric comparison used by predicates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

const EQUALITY_EPSILON: f64 = 1e-9;

impl Comparator {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Gt => lhs > rhs,
            Comparator::Gte => lhs >= rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Lte => lhs <= rhs,
            Comparator::Eq => (lhs - rhs).abs() < EQUALITY_EPSILON,
            Comparator::Ne => (lhs - rhs).abs() >= EQUALITY_EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

fn default_weight_field() -> String {
    "weight_kg".to_string()
}

fn default_height_field() -> String {
    "height_cm".to_string()
}

/// Declarative rule condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Predicate {
    /// Numeric field against a constant.
    Compare {
        field: String,
        op: Comparator,
        value: f64,
    },
    /// Traffic-light status of a field, classified with `metric`'s bands.
    Status {
        metric: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(rename = "in")]
        statuses: Vec<TrafficLightStatus>,
    },
    Equals {
        field: String,
        value: FieldValue,
    },
    OneOf {
        field: String,
        values: Vec<String>,
    },
    IsTrue {
        field: String,
    },
    /// A multiselect field includes `value`.
    Contains {
        field: String,
        value: String,
    },
    /// Whole years elapsed between a date field and the evaluation date.
    YearsSince {
        field: String,
        op: Comparator,
        years: u32,
    },
    /// Body-mass index derived from weight (kg) and height (cm).
    Bmi {
        op: Comparator,
        value: f64,
        #[serde(default = "default_weight_field")]
        weight_field: String,
        #[serde(default = "default_height_field")]
        height_field: String,
    },
    All {
        of: Vec<Predicate>,
    },
    Any {
        of: Vec<Predicate>,
    },
    Not {
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    fn validate(
        &self,
        rule: &str,
        metrics: &BTreeMap<String, MetricDefinition>,
    ) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };
        let require_field = |field: &str| {
            if field.trim().is_empty() {
                Err(invalid("predicate field must not be empty"))
            } else {
                Ok(())
            }
        };

        match self {
            Predicate::Compare { field, value, .. } => {
                require_field(field)?;
                if !value.is_finite() {
                    return Err(invalid("compare value must be finite"));
                }
            }
            Predicate::Status {
                metric,
                field,
                statuses,
            } => {
                if !metrics.contains_key(metric) {
                    return Err(ConfigError::UnknownMetric {
                        rule: rule.to_string(),
                        metric: metric.clone(),
                    });
                }
                if let Some(field) = field {
                    require_field(field)?;
                }
                if statuses.is_empty() {
                    return Err(invalid("status predicate needs at least one status"));
                }
            }
            Predicate::Equals { field, .. } | Predicate::IsTrue { field } => {
                require_field(field)?
            }
            Predicate::OneOf { field, values } => {
                require_field(field)?;
                if values.is_empty() {
                    return Err(invalid("one_of needs at least one value"));
                }
            }
            Predicate::Contains { field, value } => {
                require_field(field)?;
                if value.trim().is_empty() {
                    return Err(invalid("contains needs a non-empty value"));
                }
            }
            Predicate::YearsSince { field, .. } => require_field(field)?,
            Predicate::Bmi {
                value,
                weight_field,
                height_field,
                ..
            } => {
                require_field(weight_field)?;
                require_field(height_field)?;
                if !value.is_finite() {
                    return Err(invalid("bmi value must be finite"));
                }
            }
            Predicate::All { of } | Predicate::Any { of } => {
                if of.is_empty() {
                    return Err(invalid("all/any needs at least one predicate"));
                }
                for inner in of {
                    inner.validate(rule, metrics)?;
                }
            }
            Predicate::Not { predicate } => predicate.validate(rule, metrics)?,
        }
        Ok(())
    }
}

/// A named, severity-tagged predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub when: Predicate,
}

/// Serialized form of a catalog, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// Validated, immutable catalog. Rules keep their declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    metrics: BTreeMap<String, MetricDefinition>,
    rules: Vec<RuleDefinition>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_document(document)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, ConfigError> {
        let document = CatalogDocument::deserialize(value)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_document(document)
    }

    pub fn from_document(document: CatalogDocument) -> Result<Self, ConfigError> {
        let mut metrics = BTreeMap::new();
        for metric in document.metrics {
            metric.validate()?;
            if metrics.contains_key(&metric.name) {
                return Err(ConfigError::DuplicateMetric(metric.name));
            }
            metrics.insert(metric.name.clone(), metric);
        }

        {
            let mut seen = HashSet::new();
            for rule in &document.rules {
                if rule.id.trim().is_empty() {
                    return Err(ConfigError::InvalidRule {
                        rule: rule.title.clone(),
                        reason: "rule id must not be empty".to_string(),
                    });
                }
                if !seen.insert(rule.id.as_str()) {
                    return Err(ConfigError::DuplicateRule(rule.id.clone()));
                }
                rule.when.validate(&rule.id, &metrics)?;
            }
        }

        tracing::debug!(
            metrics = metrics.len(),
            rules = document.rules.len(),
            "catalog validated"
        );

        Ok(Self {
            metrics,
            rules: document.rules,
        })
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricDefinition> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            metrics: self.metrics.values().cloned().collect(),
            rules: self.rules.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}
