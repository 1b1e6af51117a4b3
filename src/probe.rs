use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::{
    cli::ProbeArgs,
    data::Value,
    export, io_utils, load_table,
    parser::ParsedTable,
    printable_delimiter,
    schema::{self, Schema},
    stats::{self, ColumnStats},
    table::{Align, render_table},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport<'a> {
    row_count: usize,
    column_count: usize,
    delimiter: char,
    warnings: &'a [String],
    schema: &'a Schema,
    stats: &'a [ColumnStats],
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<&'a ParsedTable>,
}

pub fn execute(args: &ProbeArgs) -> Result<()> {
    let (config, table) = load_table(&args.input)?;
    let schema = schema::detect_schema_with(&table, &config.inference);
    let stats = stats::table_stats(&schema, &table);
    info!(
        "Probed {} row(s) across {} column(s) in {:?}",
        table.row_count(),
        table.column_count(),
        args.input.input
    );

    let rendered = if args.json {
        export::to_json(&ProbeReport {
            row_count: table.row_count(),
            column_count: table.column_count(),
            delimiter: table.delimiter,
            warnings: &table.warnings,
            schema: &schema,
            stats: &stats,
            table: args.include_rows.then_some(&table),
        })?
    } else {
        render_summary(&table, &schema, &stats)
    };
    io_utils::write_output(None, &rendered)
}

fn render_summary(table: &ParsedTable, schema: &Schema, stats: &[ColumnStats]) -> String {
    let headers = [
        "#", "column", "type", "nullable", "count", "unique", "nulls", "min", "max", "mean",
        "samples",
    ];
    let aligns = [
        Align::Right,
        Align::Left,
        Align::Left,
        Align::Left,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Left,
    ];
    let rows: Vec<Vec<String>> = schema
        .columns
        .iter()
        .zip(stats)
        .enumerate()
        .map(|(idx, (column, stat))| {
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                column.column_type.to_string(),
                if column.nullable { "yes" } else { "no" }.to_string(),
                stat.count.to_string(),
                stat.unique.to_string(),
                stat.null_count.to_string(),
                optional_value(stat.min.as_ref()),
                optional_value(stat.max.as_ref()),
                stat.mean
                    .map(|mean| Value::Number(mean).as_display())
                    .unwrap_or_default(),
                column.sample_values.join(", "),
            ]
        })
        .collect();

    let mut output = format!(
        "Rows: {}  Columns: {}  Delimiter: {}\n\n",
        table.row_count(),
        table.column_count(),
        printable_delimiter(table.delimiter)
    );
    output.push_str(&render_table(&headers, &rows, &aligns));
    if !table.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &table.warnings {
            output.push_str("  ");
            output.push_str(warning);
            output.push('\n');
        }
    }
    output
}

fn optional_value(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}
