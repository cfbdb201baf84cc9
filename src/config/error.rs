//! Configuration Error Types
//!
//! Every problem found while loading or validating configuration. Any one of
//! these stops the engine from starting; a rule set is never partially loaded.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration from '{source_name}': {error}")]
    ParseError { source_name: String, error: String },

    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    #[error("Duplicate rule name '{name}'")]
    DuplicateRuleName { name: String },

    #[error("Rule '{rule}' has unknown match condition '{key}'")]
    UnknownMatchCondition { rule: String, key: String },

    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}

impl ConfigurationError {
    pub fn parse_error(source_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
