use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    cli::{ExportArgs, MapArgs, OutputFormat, SuggestArgs},
    config, export, io_utils, load_table,
    mapping::{self, FieldMapping, MappingValidation, SuggestionOptions, TargetField},
    schema,
};

fn report_validation(validation: &MappingValidation) {
    for error in &validation.errors {
        warn!("{error}");
    }
    for warning in &validation.warnings {
        warn!("{warning}");
    }
}

/// Adds exact-name matches for fields `existing` leaves unbound, skipping
/// columns it already uses.
fn seed_mappings(
    fields: &[TargetField],
    schema: &schema::Schema,
    existing: Vec<FieldMapping>,
) -> Vec<FieldMapping> {
    let mut seeded = existing;
    for candidate in mapping::create_initial_mappings(fields, schema) {
        let field_taken = seeded
            .iter()
            .any(|m| m.template_field == candidate.template_field);
        let column_taken = seeded.iter().any(|m| m.csv_column == candidate.csv_column);
        if !field_taken && !column_taken {
            seeded.push(candidate);
        }
    }
    seeded
}

pub fn suggest(args: &SuggestArgs) -> Result<()> {
    let (config, table) = load_table(&args.input)?;
    let schema = schema::detect_schema_with(&table, &config.inference);
    let fields = config::load_target_fields(&args.fields)?;
    let existing = match &args.mappings {
        Some(path) => config::load_mappings(path)?,
        None => Vec::new(),
    };
    let options = SuggestionOptions {
        min_score: args.min_score.unwrap_or(config.suggestion.min_score),
    };

    let seeded = seed_mappings(&fields, &schema, existing);
    let mappings = mapping::complete_mappings(&fields, &schema, &seeded, &options);
    let validation = mapping::validate_mapping_compatibility(&fields, &mappings, &schema);
    report_validation(&validation);
    info!(
        "Bound {} of {} field(s) ({} suggested)",
        mappings.len(),
        fields.len(),
        mappings.len() - seeded.len()
    );

    let yaml = config::to_yaml(&mappings)?;
    io_utils::write_output(args.output.as_deref(), &yaml)
        .with_context(|| format!("Writing mappings to {:?}", args.output))
}

/// Column order for CSV output: template fields in declaration order, then
/// any mapped field the template does not declare.
fn output_fields(fields: &[TargetField], mappings: &[FieldMapping]) -> Vec<String> {
    let bound: HashSet<&str> = mappings.iter().map(|m| m.template_field.as_str()).collect();
    let mut order: Vec<String> = fields
        .iter()
        .filter(|field| bound.contains(field.name.as_str()))
        .map(|field| field.name.clone())
        .collect();
    for mapping in mappings {
        if !order.contains(&mapping.template_field) {
            order.push(mapping.template_field.clone());
        }
    }
    order
}

pub fn map(args: &MapArgs) -> Result<()> {
    let (config, table) = load_table(&args.input)?;
    let schema = schema::detect_schema_with(&table, &config.inference);
    let fields = config::load_target_fields(&args.fields)?;
    let mappings = config::load_mappings(&args.mappings)?;

    let validation = mapping::validate_mapping_compatibility(&fields, &mappings, &schema);
    report_validation(&validation);
    if !validation.valid && !args.allow_invalid {
        bail!(
            "Mapping set is invalid: {}",
            validation.errors.join("; ")
        );
    }

    let result = mapping::map_csv_data(&table, &schema, &mappings)
        .with_context(|| format!("Mapping {:?}", args.input.input))?;
    info!(
        "Mapped {} row(s) with {} warning(s)",
        result.mapped_data.len(),
        result.warnings.len()
    );

    let rendered = match args.format {
        OutputFormat::Json => export::mapping_result_to_json(&result)?,
        OutputFormat::Csv => export::mapping_result_to_csv(
            &result,
            &output_fields(&fields, &mappings),
            args.output_delimiter.unwrap_or(table.delimiter),
        )?,
    };
    io_utils::write_output(args.output.as_deref(), &rendered)
}

pub fn export(args: &ExportArgs) -> Result<()> {
    let (_, table) = load_table(&args.input)?;
    let rendered = if args.json {
        export::table_to_json(&table)?
    } else {
        export::serialize_with_delimiter(&table, args.output_delimiter.unwrap_or(table.delimiter))?
    };
    io_utils::write_output(Some(&args.output), &rendered)?;
    info!(
        "Exported {} row(s) to {:?}",
        table.row_count(),
        args.output
    );
    Ok(())
}
