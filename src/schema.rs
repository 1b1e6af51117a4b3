//! Schema model and per-column type inference.
//!
//! Inference walks every non-empty cell of a column and narrows a
//! [`TypeCandidate`] until only the types consistent with all values remain.
//! Precedence is date, then number, then boolean, with string as the
//! fallback that always holds.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::anyhow;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{parse_boolean_literal, parse_date_literal, parse_number_literal},
    parser::ParsedTable,
};

pub const DEFAULT_SAMPLE_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "number", "boolean", "date"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "number" | "float" | "integer" => Ok(ColumnType::Number),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" | "datetime" => Ok(ColumnType::Date),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub delimiter: char,
}

impl Schema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// True when the schema's columns are exactly the table's headers, in order.
    pub fn matches_table(&self, table: &ParsedTable) -> bool {
        self.columns.len() == table.headers.len()
            && self
                .columns
                .iter()
                .zip(&table.headers)
                .all(|(column, header)| column.name == *header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceOptions {
    /// Maximum number of distinct sample values kept per column.
    pub sample_cap: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    non_empty: usize,
    possible_date: bool,
    possible_number: bool,
    possible_boolean: bool,
    boolean_tokens: HashSet<String>,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            non_empty: 0,
            possible_date: true,
            possible_number: true,
            possible_boolean: true,
            boolean_tokens: HashSet::new(),
        }
    }

    fn observe(&mut self, value: &str) {
        self.non_empty += 1;
        if self.possible_date && parse_date_literal(value).is_none() {
            self.possible_date = false;
        }
        if self.possible_number && parse_number_literal(value).is_none() {
            self.possible_number = false;
        }
        if self.possible_boolean {
            if parse_boolean_literal(value).is_some() {
                // Two distinct tokens are all the decision needs.
                if self.boolean_tokens.len() < 2 {
                    self.boolean_tokens.insert(value.trim().to_ascii_lowercase());
                }
            } else {
                self.possible_boolean = false;
            }
        }
    }

    fn decide(&self) -> ColumnType {
        if self.non_empty == 0 {
            ColumnType::String
        } else if self.possible_date {
            ColumnType::Date
        } else if self.possible_number {
            ColumnType::Number
        } else if self.possible_boolean && self.boolean_tokens.len() >= 2 {
            ColumnType::Boolean
        } else {
            ColumnType::String
        }
    }
}

#[derive(Debug, Clone)]
struct SampleAccumulator {
    cap: usize,
    values: Vec<String>,
}

impl SampleAccumulator {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            values: Vec::with_capacity(cap),
        }
    }

    fn record(&mut self, value: &str) {
        if self.values.len() >= self.cap || self.values.iter().any(|v| v == value) {
            return;
        }
        self.values.push(value.to_string());
    }
}

pub fn detect_schema(table: &ParsedTable) -> Schema {
    detect_schema_with(table, &InferenceOptions::default())
}

pub fn detect_schema_with(table: &ParsedTable, options: &InferenceOptions) -> Schema {
    if !table.is_usable() {
        warn!(
            "Inferring schema for a table with {} parse error(s)",
            table.errors.len()
        );
    }
    let columns = table
        .headers
        .iter()
        .enumerate()
        .map(|(idx, name)| infer_column(name, table.column_cells(idx), options.sample_cap))
        .collect();
    Schema {
        columns,
        delimiter: table.delimiter,
    }
}

fn infer_column<'a, I>(name: &str, cells: I, sample_cap: usize) -> Column
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut candidate = TypeCandidate::new();
    let mut samples = SampleAccumulator::new(sample_cap);
    let mut nullable = false;

    for cell in cells {
        match cell.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                candidate.observe(value);
                samples.record(value);
            }
            None => nullable = true,
        }
    }

    let column_type = candidate.decide();
    debug!(
        "Column '{name}' inferred as {column_type} from {} non-empty value(s)",
        candidate.non_empty
    );
    Column {
        name: name.to_string(),
        column_type,
        nullable,
        sample_values: samples.values,
    }
}
