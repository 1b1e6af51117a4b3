use std::{cmp::Ordering, fmt, sync::LazyLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::schema::ColumnType;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

static NUMBER_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("number literal pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Position on the timeline for temporal values; plain dates sit at midnight.
    pub fn as_timeline(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Date(_) | Value::DateTime(_) => "date",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_plain_number(*n),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Natural ordering within a type family. Values of different families
    /// (or `Null`) are unordered.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => Some(a.total_cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (left, right) => match (left.as_timeline(), right.as_timeline()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(_) | Value::DateTime(_) => serializer.serialize_str(&self.as_display()),
        }
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0
}

fn format_plain_number(value: f64) -> String {
    if is_integral(value) {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// A cell counts as empty when it is missing or holds only whitespace.
pub fn is_blank(cell: Option<&str>) -> bool {
    cell.is_none_or(|value| value.trim().is_empty())
}

pub fn parse_number_literal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if !NUMBER_LITERAL.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_boolean_literal(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Recognizes `YYYY-MM-DD`, `MM/DD/YYYY`, and ISO 8601 date-times. Offsets are
/// dropped after parsing so the wall-clock time is kept.
pub fn parse_date_literal(value: &str) -> Option<Value> {
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(Value::Date(date));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Value::DateTime(dt));
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| Value::DateTime(dt.naive_local()))
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Identity coercion of a raw cell under the column's inferred type.
pub fn coerce_cell(raw: Option<&str>, ty: ColumnType) -> Result<Value> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(Value::Null);
    };
    let coerced = match ty {
        ColumnType::String => Value::String(raw.to_string()),
        ColumnType::Number => Value::Number(
            parse_number_literal(raw).ok_or_else(|| anyhow!("'{raw}' is not a number"))?,
        ),
        ColumnType::Boolean => Value::Boolean(
            parse_boolean_literal(raw).ok_or_else(|| anyhow!("'{raw}' is not a boolean"))?,
        ),
        ColumnType::Date => {
            parse_date_literal(raw).ok_or_else(|| anyhow!("'{raw}' is not a recognized date"))?
        }
    };
    Ok(coerced)
}

pub fn value_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Null => evalexpr::Value::Empty,
        Value::String(s) => evalexpr::Value::String(s.clone()),
        Value::Number(n) => evalexpr::Value::Float(*n),
        Value::Boolean(b) => evalexpr::Value::Boolean(*b),
        Value::Date(_) | Value::DateTime(_) => evalexpr::Value::String(value.as_display()),
    }
}
