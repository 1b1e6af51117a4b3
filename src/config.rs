//! YAML configuration for the command-line front end.
//!
//! Every section falls back to its defaults, so a config file only needs the
//! keys it wants to change:
//!
//! ```yaml
//! parse:
//!   delimiter: ";"
//!   skipEmptyLines: false
//! inference:
//!   sampleCap: 10
//! suggestion:
//!   minScore: 40
//! ```
//!
//! Target field lists and mapping sets go through the same loader; YAML is a
//! superset of JSON, so either format is accepted.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    io_utils,
    mapping::{FieldMapping, SuggestionOptions, TargetField},
    parser::ParseOptions,
    schema::InferenceOptions,
    validate::ValidatorOptions,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinderConfig {
    pub parse: ParseOptions,
    pub inference: InferenceOptions,
    pub validation: ValidatorOptions,
    pub suggestion: SuggestionOptions,
}

impl BinderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: BinderConfig = load_document(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?;
        debug!("Loaded configuration {config:?}");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Reads a YAML (or JSON) document from a file, or stdin for `-`.
pub fn load_document<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let text = if io_utils::is_dash(path) {
        io_utils::read_stdin_string()?
    } else {
        fs::read_to_string(path).with_context(|| format!("Reading {path:?}"))?
    };
    parse_document(&text).with_context(|| format!("Parsing {path:?}"))
}

pub fn parse_document<T>(text: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(serde_yaml::from_str(text)?)
}

pub fn load_target_fields(path: &Path) -> Result<Vec<TargetField>> {
    load_document(path).with_context(|| format!("Loading target fields from {path:?}"))
}

pub fn load_mappings(path: &Path) -> Result<Vec<FieldMapping>> {
    load_document(path).with_context(|| format!("Loading mappings from {path:?}"))
}

pub fn to_yaml<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    serde_yaml::to_string(value).context("Serializing to YAML")
}
