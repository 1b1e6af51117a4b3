use anyhow::{Context, Result, anyhow};
use csv::{QuoteStyle, Terminator};
use serde::Serialize;

use crate::{
    mapping::MappingResult,
    parser::{DELIMITER_CANDIDATES, ParsedTable},
};

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow!("Delimiter {delimiter:?} must be a single ASCII character"))
}

fn csv_writer(delimiter: char, quote_style: QuoteStyle) -> Result<csv::Writer<Vec<u8>>> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter_byte(delimiter)?)
        .quote_style(quote_style)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true);
    Ok(builder.from_writer(Vec::new()))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Delimiter detection reads the header row, so a header holding any
/// candidate delimiter gets the whole row quoted.
fn header_row(headers: &[String], delimiter: char) -> Result<String> {
    let quote_style = if headers
        .iter()
        .any(|header| header.contains(DELIMITER_CANDIDATES))
    {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };
    let mut writer = csv_writer(delimiter, quote_style)?;
    writer
        .write_record(headers)
        .context("Writing header row")?;
    finish(writer)
}

/// Headers then rows, joined with the table's own delimiter. Missing cells
/// are written empty.
pub fn serialize_to_csv(table: &ParsedTable) -> Result<String> {
    serialize_with_delimiter(table, table.delimiter)
}

pub fn serialize_with_delimiter(table: &ParsedTable, delimiter: char) -> Result<String> {
    let mut output = header_row(&table.headers, delimiter)?;
    let mut writer = csv_writer(delimiter, QuoteStyle::Necessary)?;
    for (idx, record) in table.rows.iter().enumerate() {
        writer
            .write_record(record.cells().iter().map(|cell| cell.as_deref().unwrap_or("")))
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    output.push_str(&finish(writer)?);
    Ok(output)
}

/// Writes one column per entry of `fields_order`; a field a record does not
/// bind is left empty.
pub fn mapping_result_to_csv(
    result: &MappingResult,
    fields_order: &[String],
    delimiter: char,
) -> Result<String> {
    let mut output = header_row(fields_order, delimiter)?;
    let mut writer = csv_writer(delimiter, QuoteStyle::Necessary)?;
    for (idx, record) in result.mapped_data.iter().enumerate() {
        let cells = fields_order.iter().map(|field| {
            record
                .get(field)
                .map(|value| value.as_display())
                .unwrap_or_default()
        });
        writer
            .write_record(cells)
            .with_context(|| format!("Writing mapped row {}", idx + 1))?;
    }
    output.push_str(&finish(writer)?);
    Ok(output)
}

pub fn to_json<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string_pretty(value).context("Serializing to JSON")
}

pub fn table_to_json(table: &ParsedTable) -> Result<String> {
    to_json(table)
}

pub fn mapping_result_to_json(result: &MappingResult) -> Result<String> {
    to_json(result)
}
