use thiserror::Error;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("Table has {0} parse error(s) and cannot be mapped")]
    UnusableTable(usize),

    #[error("Schema columns do not match the table headers; re-run schema detection")]
    SchemaMismatch,

    #[error("Mapping for template field '{template_field}' references unknown column '{column}'")]
    UnknownColumn {
        template_field: String,
        column: String,
    },
}

/// A transform that could not be applied to one value. `fallback` is the
/// identity-coerced value the pipeline uses instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct TransformFailure {
    pub fallback: Value,
    pub reason: String,
}

impl TransformFailure {
    pub fn new(fallback: &Value, reason: impl Into<String>) -> Self {
        Self {
            fallback: fallback.clone(),
            reason: reason.into(),
        }
    }
}
