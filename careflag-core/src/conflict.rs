use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FieldValue;

/// Where a conflict currently stands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Unresolved,
    UseForm,
    UseDocument,
}

/// A user's decision on a conflict. Cannot express "unresolved".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    UseForm,
    UseDocument,
}

impl From<Choice> for Resolution {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::UseForm => Resolution::UseForm,
            Choice::UseDocument => Resolution::UseDocument,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resolution `{0}`, expected use_form or use_document")]
pub struct ParseChoiceError(pub String);

impl FromStr for Choice {
    type Err = ParseChoiceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "use_form" | "form" => Ok(Choice::UseForm),
            "use_document" | "document" | "pdf" => Ok(Choice::UseDocument),
            other => Err(ParseChoiceError(other.to_string())),
        }
    }
}

/// Two sources disagree on one field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub field_name: String,
    pub form_value: FieldValue,
    pub document_value: FieldValue,
    pub unit: String,
    pub resolution: Resolution,
}

impl Conflict {
    pub fn new(
        field_name: impl Into<String>,
        form_value: FieldValue,
        document_value: FieldValue,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            form_value,
            document_value,
            unit: unit.into(),
            resolution: Resolution::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unresolved
    }

    /// The value the current resolution selects, if any.
    pub fn chosen_value(&self) -> Option<&FieldValue> {
        match self.resolution {
            Resolution::Unresolved => None,
            Resolution::UseForm => Some(&self.form_value),
            Resolution::UseDocument => Some(&self.document_value),
        }
    }
}
