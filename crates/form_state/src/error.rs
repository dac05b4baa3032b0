use std::fmt::{Display, Formatter};
use std::str::FromStr;

use form_path::PathError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// Engine-level failures.
///
/// Field validation failures are not errors in this sense, they are stored as [`FieldError`]s.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Path error. cause: {0}")]
    Path(#[from] PathError),

    #[error("Resolver error. cause: {0}")]
    Resolver(anyhow::Error),

    #[error("Submit handler error. cause: {0}")]
    Handler(anyhow::Error),

    #[error("Unknown field array. name: '{0}'")]
    UnknownFieldArray(String),
}

/// The rule that produced a [`FieldError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub enum ErrorKind {
    Required,
    Min,
    Max,
    MinLength,
    MaxLength,
    Pattern,
    /// A single, unnamed custom validator.
    Validate,
    /// Set by the caller, see [`crate::Control::set_error`].
    Manual,
    /// A named custom validator, or a kind reported by a resolver.
    Custom(String),
}

impl ErrorKind {
    pub fn custom(kind: &str) -> Self {
        // known names map back to their variants so resolver errors compare equal to native ones
        ErrorKind::from_str(kind).unwrap_or_else(|_| ErrorKind::Custom(kind.to_string()))
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Required => f.write_str("required"),
            ErrorKind::Min => f.write_str("min"),
            ErrorKind::Max => f.write_str("max"),
            ErrorKind::MinLength => f.write_str("minLength"),
            ErrorKind::MaxLength => f.write_str("maxLength"),
            ErrorKind::Pattern => f.write_str("pattern"),
            ErrorKind::Validate => f.write_str("validate"),
            ErrorKind::Manual => f.write_str("manual"),
            ErrorKind::Custom(kind) => f.write_str(kind),
        }
    }
}

impl FromStr for ErrorKind {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "required" => ErrorKind::Required,
            "min" => ErrorKind::Min,
            "max" => ErrorKind::Max,
            "minLength" => ErrorKind::MinLength,
            "maxLength" => ErrorKind::MaxLength,
            "pattern" => ErrorKind::Pattern,
            "validate" => ErrorKind::Validate,
            "manual" => ErrorKind::Manual,
            other => ErrorKind::Custom(other.to_string()),
        })
    }
}

/// A stored field error.
///
/// `types` is only populated with [`crate::CriteriaMode::All`], keyed by rule name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub types: IndexMap<String, String>,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            types: IndexMap::new(),
        }
    }

    pub fn manual(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Manual, message)
    }

    pub fn with_type(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.types
            .insert(kind.into(), message.into());
        self
    }

    pub fn is_manual(&self) -> bool {
        self.kind == ErrorKind::Manual
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    pub fn serializes_with_type_key() {
        // given
        let error = FieldError::new(ErrorKind::MinLength, "too short");

        // when
        let value = serde_json::to_value(&error).unwrap();

        // then
        assert_eq!(value, json!({"type": "minLength", "message": "too short"}));
    }

    #[test]
    pub fn custom_kinds_map_back_to_known_kinds() {
        // expect
        assert_eq!(ErrorKind::custom("required"), ErrorKind::Required);
        assert_eq!(ErrorKind::custom("positive"), ErrorKind::Custom("positive".to_string()));
        assert_eq!(ErrorKind::Custom("positive".to_string()).to_string(), "positive");
    }

    #[test]
    pub fn form_error_messages() {
        // expect
        assert_eq!(
            FormError::UnknownFieldArray("items".to_string()).to_string(),
            "Unknown field array. name: 'items'"
        );
        assert_eq!(FormError::Path(PathError::Empty).to_string(), "Path error. cause: Empty field path");
    }
}
