use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    data::{Value, coerce_cell, is_blank},
    parser::ParsedTable,
    schema::{Column, ColumnType, Schema},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub unique: usize,
    pub null_count: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

#[derive(Debug, Default)]
struct NumericAccumulator {
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
}

impl NumericAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> Option<f64> {
        if self.count() > 0 {
            Some(self.sum / self.count() as f64)
        } else {
            None
        }
    }

    fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len().is_multiple_of(2) {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

#[derive(Debug, Default)]
struct RangeAccumulator {
    min: Option<Value>,
    max: Option<Value>,
}

impl RangeAccumulator {
    fn add(&mut self, value: &Value) {
        let replace_min = match &self.min {
            Some(current) => value.natural_cmp(current) == Some(Ordering::Less),
            None => true,
        };
        if replace_min {
            self.min = Some(value.clone());
        }
        let replace_max = match &self.max {
            Some(current) => value.natural_cmp(current) == Some(Ordering::Greater),
            None => true,
        };
        if replace_max {
            self.max = Some(value.clone());
        }
    }
}

pub fn column_stats(column: &Column, table: &ParsedTable) -> ColumnStats {
    let Some(index) = table.header_index(&column.name) else {
        debug!("Column '{}' not present in table; reporting empty stats", column.name);
        return ColumnStats {
            column: column.name.clone(),
            count: 0,
            unique: 0,
            null_count: table.row_count(),
            min: None,
            max: None,
            mean: None,
            median: None,
            std_dev: None,
        };
    };

    let present: Vec<&str> = table
        .column_cells(index)
        .filter(|cell| !is_blank(*cell))
        .flatten()
        .collect();
    let count = present.len();
    let unique = present.iter().unique().count();
    let null_count = table.row_count() - count;

    let ordered = matches!(column.column_type, ColumnType::Number | ColumnType::Date);
    let mut numeric = NumericAccumulator::default();
    let mut range = RangeAccumulator::default();
    if ordered {
        for &raw in &present {
            let Ok(value) = coerce_cell(Some(raw), column.column_type) else {
                continue;
            };
            if let Some(n) = value.as_number() {
                numeric.add(n);
            }
            range.add(&value);
        }
    }

    ColumnStats {
        column: column.name.clone(),
        count,
        unique,
        null_count,
        min: range.min,
        max: range.max,
        mean: numeric.mean(),
        median: numeric.median(),
        std_dev: numeric.std_dev(),
    }
}

pub fn table_stats(schema: &Schema, table: &ParsedTable) -> Vec<ColumnStats> {
    schema
        .columns
        .iter()
        .map(|column| column_stats(column, table))
        .collect()
}
