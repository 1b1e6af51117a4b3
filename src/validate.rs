use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::parser::detect_delimiter;

pub const DEFAULT_MAX_INCONSISTENT_RATIO: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Content is empty")]
    EmptyContent,
    #[error(
        "{inconsistent} of {total} record(s) have a field count different from the header's {expected}"
    )]
    InconsistentColumns {
        inconsistent: usize,
        total: usize,
        expected: usize,
    },
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Fraction of data records allowed to disagree with the header's field
    /// count before the content is rejected.
    pub max_inconsistent_ratio: f64,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_inconsistent_ratio: DEFAULT_MAX_INCONSISTENT_RATIO,
        }
    }
}

pub fn validate_content(content: &str, options: &ValidatorOptions) -> ValidationReport {
    let body = content.strip_prefix('\u{feff}').unwrap_or(content);
    if body.trim().is_empty() {
        return ValidationReport::from_errors(vec![ValidationError::EmptyContent]);
    }

    let mut errors = Vec::new();
    if let Some(problem) = encoding_problem(body) {
        errors.push(ValidationError::UnsupportedEncoding(problem));
    }
    if let Some(error) = check_column_consistency(body, options.max_inconsistent_ratio) {
        errors.push(error);
    }
    ValidationReport::from_errors(errors)
}

fn encoding_problem(content: &str) -> Option<String> {
    for (offset, ch) in content.char_indices() {
        match ch {
            '\0' => return Some(format!("null byte at offset {offset}")),
            '\u{feff}' => return Some(format!("byte-order mark at offset {offset}")),
            '\u{fffe}' => {
                return Some(format!(
                    "reversed byte-order mark at offset {offset} (UTF-16 data read as text?)"
                ));
            }
            '\t' | '\n' | '\r' | '\u{0c}' => {}
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                return Some(format!(
                    "control character U+{:04X} at offset {offset}",
                    c as u32
                ));
            }
            _ => {}
        }
    }
    None
}

/// Quote-aware field counts for each non-blank record. Cheaper than a parse:
/// no field text is materialized.
fn record_field_counts(content: &str, delimiter: char) -> Vec<usize> {
    let mut counts = Vec::new();
    let mut fields = 1usize;
    let mut in_quotes = false;
    let mut has_content = false;
    for ch in content.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_content = true;
            }
            '\n' | '\r' if !in_quotes => {
                if has_content {
                    counts.push(fields);
                }
                fields = 1;
                has_content = false;
            }
            c if c == delimiter && !in_quotes => {
                fields += 1;
                has_content = true;
            }
            c if !c.is_whitespace() => has_content = true,
            _ => {}
        }
    }
    if has_content {
        counts.push(fields);
    }
    counts
}

fn check_column_consistency(content: &str, max_ratio: f64) -> Option<ValidationError> {
    let delimiter = detect_delimiter(content);
    let counts = record_field_counts(content, delimiter);
    let (expected, data) = counts.split_first()?;
    if data.is_empty() {
        return None;
    }
    let inconsistent = data.iter().filter(|count| *count != expected).count();
    let ratio = inconsistent as f64 / data.len() as f64;
    (ratio > max_ratio).then_some(ValidationError::InconsistentColumns {
        inconsistent,
        total: data.len(),
        expected: *expected,
    })
}
