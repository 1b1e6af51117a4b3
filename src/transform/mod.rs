//! Per-field transforms applied while materializing mapped records.
//!
//! A [`Transform`] is the serialized, user-editable description. Before a
//! column is mapped it is compiled once into a [`CompiledTransform`] so a bad
//! expression or format rule is diagnosed a single time instead of per row.

pub mod expr;
pub mod format;
pub mod string_ops;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use crate::data::coerce_cell;
use crate::{
    data::{Value, normalize_column_name},
    error::TransformFailure,
    parser::Record,
    schema::Schema,
    transform::{expr::CompiledExpression, format::FormatRule},
};

/// Open key/value settings whose shape depends on the transform kind.
pub type TransformConfig = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    #[default]
    Identity,
    Format {
        #[serde(default)]
        config: TransformConfig,
    },
    Calculate {
        #[serde(default)]
        config: TransformConfig,
    },
}

impl Transform {
    pub fn format(config: TransformConfig) -> Self {
        Transform::Format { config }
    }

    pub fn calculate(expression: impl Into<String>) -> Self {
        let mut config = TransformConfig::new();
        config.insert(
            "expression".to_string(),
            serde_json::Value::String(expression.into()),
        );
        Transform::Calculate { config }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Format { .. } => "format",
            Transform::Calculate { .. } => "calculate",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transform::Identity)
    }
}

/// One row's coerced values, addressable by column name or by the normalized
/// identifier expressions use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowContext {
    entries: Vec<(String, String, Value)>,
}

impl RowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerces every cell of `record` under its column's type. A cell that no
    /// longer fits the type is kept as text.
    pub fn from_record(schema: &Schema, record: &Record) -> Self {
        let entries = schema
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let raw = record.get(idx);
                let value = coerce_cell(raw, column.column_type).unwrap_or_else(|_| {
                    raw.map(|text| Value::String(text.to_string()))
                        .unwrap_or(Value::Null)
                });
                (column.name.clone(), normalize_column_name(&column.name), value)
            })
            .collect();
        Self { entries }
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.entries
            .push((name.to_string(), normalize_column_name(name), value));
        self
    }

    /// Exact column-name lookup.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _, _)| name == column)
            .map(|(_, _, value)| value)
    }

    /// Lookup by expression identifier; the first column whose normalized
    /// name matches wins.
    pub fn lookup(&self, identifier: &str) -> Option<&Value> {
        let wanted = normalize_column_name(identifier);
        self.entries
            .iter()
            .find(|(_, normalized, _)| *normalized == wanted)
            .map(|(_, _, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledTransform {
    Identity,
    Format(FormatRule),
    Calculate(CompiledExpression),
}

impl CompiledTransform {
    pub fn compile(transform: &Transform) -> Result<Self> {
        let compiled = match transform {
            Transform::Identity => CompiledTransform::Identity,
            Transform::Format { config } => CompiledTransform::Format(FormatRule::from_config(config)?),
            Transform::Calculate { config } => {
                CompiledTransform::Calculate(CompiledExpression::from_config(config)?)
            }
        };
        Ok(compiled)
    }

    /// Only `calculate` reads other cells of the row.
    pub fn needs_row_context(&self) -> bool {
        matches!(self, CompiledTransform::Calculate(_))
    }

    pub fn apply(&self, value: &Value, row: &RowContext) -> Result<Value, TransformFailure> {
        let outcome = match self {
            CompiledTransform::Identity => return Ok(value.clone()),
            CompiledTransform::Format(rule) => rule.apply(value),
            CompiledTransform::Calculate(expression) => expression.evaluate(value, row),
        };
        outcome.map_err(|err| TransformFailure::new(value, format!("{err:#}")))
    }
}

/// Applies `transform` to an identity-coerced `value`. Failures carry the
/// identity value as their fallback.
pub fn apply_transform(
    value: &Value,
    transform: &Transform,
    row: &RowContext,
) -> Result<Value, TransformFailure> {
    let compiled = CompiledTransform::compile(transform)
        .map_err(|err| TransformFailure::new(value, format!("{err:#}")))?;
    compiled.apply(value, row)
}
