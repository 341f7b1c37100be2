#![forbid(unsafe_code)]

//! Error types for form construction and configuration.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormError>;

/// Configuration faults. Validation and submission failures are data and are
/// never reported through this type.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("no on_submit handler specified")]
    MissingSubmitHandler,

    #[error("invalid form options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("initial values must be an object, found {found}")]
    InvalidInitialValues { found: &'static str },
}

impl FormError {
    #[must_use]
    pub fn invalid_initial_values(value: &Value) -> Self {
        let found = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        Self::InvalidInitialValues { found }
    }
}
