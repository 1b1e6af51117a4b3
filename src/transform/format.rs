use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow, bail};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    transform::{TransformConfig, string_ops::TextCase},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStyle {
    #[default]
    Decimal,
    Percent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FormatRule {
    pub decimals: Option<usize>,
    pub locale: Option<String>,
    pub use_grouping: Option<bool>,
    pub style: NumberStyle,
    pub date_pattern: Option<String>,
    pub true_label: Option<String>,
    pub false_label: Option<String>,
    pub case: Option<TextCase>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl FormatRule {
    pub fn from_config(config: &TransformConfig) -> Result<Self> {
        let object: serde_json::Map<String, serde_json::Value> = config
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let rule: FormatRule = serde_json::from_value(serde_json::Value::Object(object))
            .context("Invalid format config")?;
        rule.validate()?;
        Ok(rule)
    }

    fn validate(&self) -> Result<()> {
        if let Some(locale) = self.locale.as_deref() {
            locale_separators(locale)?;
        }
        if let Some(pattern) = self.date_pattern.as_deref()
            && StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
        {
            bail!("Invalid datePattern '{pattern}'");
        }
        Ok(())
    }

    fn has_numeric_rules(&self) -> bool {
        self.decimals.is_some() || self.style == NumberStyle::Percent
    }

    pub fn apply(&self, value: &Value) -> Result<Value> {
        let rendered = match value {
            Value::Null => return Ok(Value::Null),
            Value::Number(n) => {
                if self.date_pattern.is_some() {
                    bail!("datePattern cannot format number {}", value.as_display());
                }
                self.format_number(*n)?
            }
            Value::Date(_) | Value::DateTime(_) => {
                if self.has_numeric_rules() {
                    bail!("Numeric format cannot apply to date {}", value.as_display());
                }
                match self.date_pattern.as_deref() {
                    Some(pattern) => format_temporal(value, pattern)?,
                    None => value.as_display(),
                }
            }
            Value::Boolean(b) => {
                if self.has_numeric_rules() || self.date_pattern.is_some() {
                    bail!("Numeric or date format cannot apply to boolean {b}");
                }
                let label = if *b { &self.true_label } else { &self.false_label };
                label.clone().unwrap_or_else(|| b.to_string())
            }
            Value::String(s) => {
                if self.has_numeric_rules() {
                    bail!("Numeric format cannot apply to text '{s}'");
                }
                if self.date_pattern.is_some() {
                    bail!("datePattern cannot format text '{s}'");
                }
                match self.case {
                    Some(case) => case.apply(s).into_owned(),
                    None => s.clone(),
                }
            }
        };
        Ok(Value::String(self.with_affixes(rendered)))
    }

    fn with_affixes(&self, body: String) -> String {
        match (self.prefix.as_deref(), self.suffix.as_deref()) {
            (None, None) => body,
            (prefix, suffix) => format!(
                "{}{body}{}",
                prefix.unwrap_or_default(),
                suffix.unwrap_or_default()
            ),
        }
    }

    fn format_number(&self, value: f64) -> Result<String> {
        let (group, decimal) = locale_separators(self.locale.as_deref().unwrap_or("en-US"))?;
        let scaled = match self.style {
            NumberStyle::Decimal => value,
            NumberStyle::Percent => value * 100.0,
        };
        if !scaled.is_finite() {
            bail!("Cannot format non-finite number");
        }
        let digits = match self.decimals {
            Some(places) => format!("{:.*}", places, scaled.abs()),
            None => {
                let places = match self.style {
                    NumberStyle::Decimal => DEFAULT_DECIMAL_PLACES,
                    NumberStyle::Percent => DEFAULT_PERCENT_PLACES,
                };
                let fixed = format!("{:.*}", places, scaled.abs());
                if fixed.contains('.') {
                    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
                } else {
                    fixed
                }
            }
        };
        let (integer, fraction) = match digits.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (digits.as_str(), None),
        };

        let mut out = String::with_capacity(digits.len() + 4);
        if scaled.is_sign_negative() && digits.chars().any(|c| matches!(c, '1'..='9')) {
            out.push('-');
        }
        if self.use_grouping.unwrap_or(true) {
            out.push_str(&group_digits(integer, group));
        } else {
            out.push_str(integer);
        }
        if let Some(fraction) = fraction {
            out.push(decimal);
            out.push_str(fraction);
        }
        if self.style == NumberStyle::Percent {
            out.push('%');
        }
        Ok(out)
    }
}

fn format_temporal(value: &Value, pattern: &str) -> Result<String> {
    let mut out = String::new();
    let written = match value {
        Value::Date(d) => write!(out, "{}", d.format(pattern)),
        Value::DateTime(dt) => write!(out, "{}", dt.format(pattern)),
        _ => return Err(anyhow!("datePattern requires a date value")),
    };
    written.map_err(|_| anyhow!("datePattern '{pattern}' does not fit {}", value.as_display()))?;
    Ok(out)
}

/// Upper bound on fraction digits when `decimals` is not set. Trailing
/// zeros are dropped.
const DEFAULT_DECIMAL_PLACES: usize = 3;
const DEFAULT_PERCENT_PLACES: usize = 0;

/// Group separator and decimal mark for the supported locales.
fn locale_separators(locale: &str) -> Result<(char, char)> {
    let normalized = locale.trim().replace('_', "-").to_ascii_lowercase();
    let separators = match normalized.as_str() {
        "de-ch" => ('\'', '.'),
        "fr" | "fr-fr" | "fr-ca" | "fr-be" => ('\u{202f}', ','),
        tag => match tag.split('-').next().unwrap_or_default() {
            "en" | "ja" | "zh" | "ko" | "he" | "th" => (',', '.'),
            "de" | "es" | "it" | "nl" | "pt" | "id" | "da" | "tr" => ('.', ','),
            "ru" | "pl" | "sv" | "nb" | "fi" | "cs" | "uk" => ('\u{a0}', ','),
            _ => bail!("Unsupported locale '{locale}'"),
        },
    };
    Ok(separators)
}

fn group_digits(integer: &str, separator: char) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (len - idx).is_multiple_of(3) {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}
