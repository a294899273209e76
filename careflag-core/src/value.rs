use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ValidationError;

/// A clinical value as it arrives from a form or a lab report. `List`
/// carries multiselect entries such as current medications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Numeric view. Text is accepted when it parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok(),
            FieldValue::Flag(_) | FieldValue::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// ISO `YYYY-MM-DD` dates carried as text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_text()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
    }

    /// Empty form widgets come through as blank text or an empty selection.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Flag(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(flag) => write!(f, "{flag}"),
            FieldValue::Number(value) => f.write_str(&format_numeric(*value)),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

impl From<&[&str]> for FieldValue {
    fn from(items: &[&str]) -> Self {
        FieldValue::List(items.iter().map(|item| item.to_string()).collect())
    }
}

fn format_numeric(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// One view of a patient's clinical fields, keyed by field name.
///
/// Fields iterate in name order so serialized snapshots are stable.
/// Deserializing drops `null` entries and values of an unsupported shape,
/// so one odd widget never rejects the whole form.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct PatientSnapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl PatientSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Finite number for `field`; `Ok(None)` when the field is absent.
    pub fn number(&self, field: &str) -> Result<Option<f64>, ValidationError> {
        let Some(value) = self.fields.get(field) else {
            return Ok(None);
        };
        match value.as_number() {
            Some(number) if number.is_finite() => Ok(Some(number)),
            _ => Err(ValidationError::new(field, "a finite number", value)),
        }
    }

    pub fn text(&self, field: &str) -> Result<Option<&str>, ValidationError> {
        let Some(value) = self.fields.get(field) else {
            return Ok(None);
        };
        value
            .as_text()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "text", value))
    }

    pub fn flag(&self, field: &str) -> Result<Option<bool>, ValidationError> {
        let Some(value) = self.fields.get(field) else {
            return Ok(None);
        };
        value
            .as_flag()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "a boolean", value))
    }

    pub fn list(&self, field: &str) -> Result<Option<&[String]>, ValidationError> {
        let Some(value) = self.fields.get(field) else {
            return Ok(None);
        };
        value
            .as_list()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "a list", value))
    }

    pub fn date(&self, field: &str) -> Result<Option<NaiveDate>, ValidationError> {
        let Some(value) = self.fields.get(field) else {
            return Ok(None);
        };
        value
            .as_date()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "a YYYY-MM-DD date", value))
    }
}

impl<K, V> FromIterator<(K, V)> for PatientSnapshot
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingValue {
    Supported(FieldValue),
    Unsupported(IgnoredAny),
}

impl<'de> Deserialize<'de> for PatientSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Option<IncomingValue>>::deserialize(deserializer)?;
        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            match value {
                Some(IncomingValue::Supported(value)) => {
                    fields.insert(name, value);
                }
                Some(IncomingValue::Unsupported(_)) => {
                    tracing::debug!(field = %name, "unsupported value shape dropped");
                }
                None => {}
            }
        }
        Ok(Self { fields })
    }
}

/// A single reading extracted from an uploaded lab report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentValue {
    pub value: FieldValue,
    #[serde(default, deserialize_with = "unit_or_empty")]
    pub unit: String,
}

impl DocumentValue {
    pub fn new(value: impl Into<FieldValue>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// Test name to extracted reading, as produced by the report extractor.
pub type LabReport = BTreeMap<String, DocumentValue>;

fn unit_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
