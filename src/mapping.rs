use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{
    data::{Value, coerce_cell, normalize_column_name},
    error::MappingError,
    parser::ParsedTable,
    schema::{Column, ColumnType, Schema},
    transform::{CompiledTransform, RowContext, Transform, string_ops::name_tokens},
};

pub const DEFAULT_MIN_SCORE: f64 = 25.0;

const EXACT_NAME_SCORE: f64 = 100.0;
const PREFIX_SCORE: f64 = 50.0;
const SUBSTRING_SCORE: f64 = 40.0;
const TYPE_COMPATIBLE_SCORE: f64 = 20.0;
const TOKEN_OVERLAP_SCORE: f64 = 15.0;

/// How a template field uses its data, independent of the column's storage
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    #[serde(alias = "number", alias = "numeric")]
    Quantitative,
    #[serde(alias = "string", alias = "category", alias = "boolean")]
    Nominal,
    #[serde(alias = "date", alias = "time", alias = "datetime")]
    Temporal,
    Ordinal,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Quantitative => "quantitative",
            SemanticType::Nominal => "nominal",
            SemanticType::Temporal => "temporal",
            SemanticType::Ordinal => "ordinal",
        }
    }

    pub fn accepts(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (SemanticType::Quantitative, ColumnType::Number)
                | (SemanticType::Nominal, ColumnType::String | ColumnType::Boolean)
                | (SemanticType::Temporal, ColumnType::Date)
                | (SemanticType::Ordinal, ColumnType::String | ColumnType::Number)
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quantitative" | "number" | "numeric" => Ok(SemanticType::Quantitative),
            "nominal" | "string" | "category" | "boolean" => Ok(SemanticType::Nominal),
            "temporal" | "date" | "time" | "datetime" => Ok(SemanticType::Temporal),
            "ordinal" => Ok(SemanticType::Ordinal),
            other => Err(anyhow!(
                "Unknown field type '{other}'. Supported types: quantitative, nominal, temporal, ordinal"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<SemanticType>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TargetField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            semantic_type: None,
            required: false,
            description: None,
        }
    }

    pub fn typed(mut self, semantic_type: SemanticType) -> Self {
        self.semantic_type = Some(semantic_type);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Untyped fields accept any column.
    pub fn accepts(&self, column_type: ColumnType) -> bool {
        self.semantic_type
            .is_none_or(|semantic| semantic.accepts(column_type))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub template_field: String,
    pub csv_column: String,
    #[serde(default)]
    pub transform: Transform,
}

impl FieldMapping {
    pub fn identity(template_field: impl Into<String>, csv_column: impl Into<String>) -> Self {
        Self {
            template_field: template_field.into(),
            csv_column: csv_column.into(),
            transform: Transform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MappingValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuggestionOptions {
    /// Lowest score a column needs before it is suggested.
    pub min_score: f64,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// One output record: bound template fields in mapping order. Unbound fields
/// are absent rather than null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedRecord {
    entries: Vec<(String, Value)>,
}

impl MappedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MappedRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub mapped_data: Vec<MappedRecord>,
    pub warnings: Vec<String>,
}

/// Seeds an identity mapping for every field whose name equals a column name
/// ignoring case. An exact-case column wins over an earlier case-insensitive
/// one.
pub fn create_initial_mappings(fields: &[TargetField], schema: &Schema) -> Vec<FieldMapping> {
    let mut mappings = Vec::new();
    for field in fields {
        let exact = schema.columns.iter().find(|column| column.name == field.name);
        let column = exact.or_else(|| {
            schema
                .columns
                .iter()
                .find(|column| column.name.eq_ignore_ascii_case(&field.name))
        });
        if let Some(column) = column {
            debug!("Initial mapping '{}' -> '{}'", field.name, column.name);
            mappings.push(FieldMapping::identity(&field.name, &column.name));
        }
    }
    mappings
}

/// Scores how well `column` fits `field`. The name contributes one of exact,
/// prefix or substring weight; type compatibility and word overlap are added
/// on top, so a typed substring can outrank an untyped prefix. Type
/// compatibility alone stays below the default threshold.
pub fn match_score(field: &TargetField, column: &Column) -> f64 {
    let field_key = normalize_column_name(&field.name);
    let column_key = normalize_column_name(&column.name);
    if field_key.is_empty() || column_key.is_empty() {
        return 0.0;
    }

    let mut score = if field_key == column_key {
        EXACT_NAME_SCORE
    } else if column_key.starts_with(&field_key) || field_key.starts_with(&column_key) {
        PREFIX_SCORE
    } else if column_key.contains(&field_key) || field_key.contains(&column_key) {
        SUBSTRING_SCORE
    } else {
        0.0
    };
    if field.accepts(column.column_type) {
        score += TYPE_COMPATIBLE_SCORE;
    }
    score + TOKEN_OVERLAP_SCORE * token_overlap(&field.name, &column.name)
}

/// Jaccard similarity of the two names' word sets.
fn token_overlap(left: &str, right: &str) -> f64 {
    let left: HashSet<String> = name_tokens(left).into_iter().collect();
    let right: HashSet<String> = name_tokens(right).into_iter().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

pub fn generate_mapping_suggestions(
    fields: &[TargetField],
    schema: &Schema,
    options: &SuggestionOptions,
) -> Vec<FieldMapping> {
    complete_mappings(fields, schema, &[], options)
}

/// Keeps `existing` and suggests a column for every field it leaves
/// unmapped, never reusing a column that is already bound.
pub fn complete_mappings(
    fields: &[TargetField],
    schema: &Schema,
    existing: &[FieldMapping],
    options: &SuggestionOptions,
) -> Vec<FieldMapping> {
    let mut mappings = existing.to_vec();
    let mut used: HashSet<&str> = existing
        .iter()
        .map(|mapping| mapping.csv_column.as_str())
        .collect();

    for field in fields {
        if mappings
            .iter()
            .any(|mapping| mapping.template_field == field.name)
        {
            continue;
        }
        let mut best: Option<(&Column, f64)> = None;
        for column in &schema.columns {
            if used.contains(column.name.as_str()) {
                continue;
            }
            let score = match_score(field, column);
            debug!("Score '{}' vs '{}': {score:.2}", field.name, column.name);
            if score < options.min_score {
                continue;
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((column, score));
            }
        }
        if let Some((column, score)) = best {
            debug!(
                "Suggesting '{}' -> '{}' (score {score:.2})",
                field.name, column.name
            );
            used.insert(column.name.as_str());
            mappings.push(FieldMapping::identity(&field.name, &column.name));
        }
    }
    mappings
}

pub fn validate_mapping_compatibility(
    fields: &[TargetField],
    mappings: &[FieldMapping],
    schema: &Schema,
) -> MappingValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in fields.iter().filter(|field| field.required) {
        if !mappings
            .iter()
            .any(|mapping| mapping.template_field == field.name)
        {
            errors.push(format!("Required field '{}' is not mapped", field.name));
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for mapping in mappings {
        if !seen.insert(mapping.template_field.as_str()) {
            warnings.push(format!(
                "Field '{}' is mapped more than once; the last mapping wins",
                mapping.template_field
            ));
        }
        let field = fields
            .iter()
            .find(|field| field.name == mapping.template_field);
        if field.is_none() {
            warnings.push(format!(
                "Mapping targets '{}', which is not a template field",
                mapping.template_field
            ));
        }
        let Some(column) = schema.column(&mapping.csv_column) else {
            errors.push(format!(
                "Field '{}' is mapped to unknown column '{}'",
                mapping.template_field, mapping.csv_column
            ));
            continue;
        };
        if let Some(field) = field
            && let Some(semantic) = field.semantic_type
            && !semantic.accepts(column.column_type)
        {
            warnings.push(format!(
                "Field '{}' expects {semantic} data but column '{}' is {}",
                field.name, column.name, column.column_type
            ));
        }
    }

    MappingValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Replaces the mapping for the same template field in place, or appends.
pub fn upsert_mapping(mappings: &[FieldMapping], mapping: FieldMapping) -> Vec<FieldMapping> {
    let mut updated = mappings.to_vec();
    match updated
        .iter_mut()
        .find(|existing| existing.template_field == mapping.template_field)
    {
        Some(existing) => *existing = mapping,
        None => updated.push(mapping),
    }
    updated
}

pub fn remove_mapping(mappings: &[FieldMapping], template_field: &str) -> Vec<FieldMapping> {
    mappings
        .iter()
        .filter(|mapping| mapping.template_field != template_field)
        .cloned()
        .collect()
}

/// Collapses duplicate template fields, keeping the last mapping at the
/// position of the first.
fn dedupe_mappings(mappings: &[FieldMapping]) -> Vec<FieldMapping> {
    mappings
        .iter()
        .fold(Vec::new(), |acc, mapping| upsert_mapping(&acc, mapping.clone()))
}

struct BoundColumn {
    field: String,
    index: usize,
    column_type: ColumnType,
    transform: CompiledTransform,
}

#[derive(Default)]
struct WarningTally {
    entries: Vec<(String, String, usize)>,
}

impl WarningTally {
    fn record(&mut self, field: &str, reason: String) {
        match self
            .entries
            .iter_mut()
            .find(|(known_field, known_reason, _)| known_field == field && *known_reason == reason)
        {
            Some((_, _, count)) => *count += 1,
            None => self.entries.push((field.to_string(), reason, 1)),
        }
    }

    fn into_messages(self) -> Vec<String> {
        self.entries
            .into_iter()
            .map(|(field, reason, count)| {
                format!("Field '{field}': {reason} ({count} row(s) used the untransformed value)")
            })
            .collect()
    }
}

/// Materializes one record per table row. Transform failures degrade the
/// affected cells to their identity value and are reported as warnings.
pub fn map_csv_data(
    table: &ParsedTable,
    schema: &Schema,
    mappings: &[FieldMapping],
) -> Result<MappingResult, MappingError> {
    if !table.is_usable() {
        return Err(MappingError::UnusableTable(table.errors.len()));
    }
    if !schema.matches_table(table) {
        return Err(MappingError::SchemaMismatch);
    }

    let mut warnings = Vec::new();
    let mut bound = Vec::new();
    for mapping in dedupe_mappings(mappings) {
        let (Some(index), Some(column)) = (
            schema.column_index(&mapping.csv_column),
            schema.column(&mapping.csv_column),
        ) else {
            return Err(MappingError::UnknownColumn {
                template_field: mapping.template_field,
                column: mapping.csv_column,
            });
        };
        let transform = CompiledTransform::compile(&mapping.transform).unwrap_or_else(|err| {
            warn!(
                "{} transform for '{}' is invalid: {err:#}",
                mapping.transform.kind(),
                mapping.template_field
            );
            warnings.push(format!(
                "Field '{}': {} transform is invalid ({err:#}); using identity for all rows",
                mapping.template_field,
                mapping.transform.kind()
            ));
            CompiledTransform::Identity
        });
        bound.push(BoundColumn {
            field: mapping.template_field,
            index,
            column_type: column.column_type,
            transform,
        });
    }
    let needs_row = bound.iter().any(|column| column.transform.needs_row_context());

    let mut tally = WarningTally::default();
    let mut mapped_data = Vec::with_capacity(table.row_count());
    for record in &table.rows {
        let row = if needs_row {
            RowContext::from_record(schema, record)
        } else {
            RowContext::new()
        };
        let mut entries = Vec::with_capacity(bound.len());
        for column in &bound {
            let raw = record.get(column.index);
            let identity = match coerce_cell(raw, column.column_type) {
                Ok(value) => value,
                Err(err) => {
                    tally.record(&column.field, format!("{err:#}"));
                    raw.map(|text| Value::String(text.to_string()))
                        .unwrap_or(Value::Null)
                }
            };
            let value = match column.transform.apply(&identity, &row) {
                Ok(value) => value,
                Err(failure) => {
                    tally.record(&column.field, failure.reason);
                    failure.fallback
                }
            };
            entries.push((column.field.clone(), value));
        }
        mapped_data.push(MappedRecord { entries });
    }

    let degraded = tally.into_messages();
    for message in &degraded {
        warn!("{message}");
    }
    warnings.extend(degraded);
    debug!(
        "Mapped {} row(s) across {} field(s) with {} warning(s)",
        mapped_data.len(),
        bound.len(),
        warnings.len()
    );
    Ok(MappingResult {
        mapped_data,
        warnings,
    })
}
