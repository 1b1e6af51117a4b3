use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect CSV data and bind its columns to template fields", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the cheap pre-parse checks and report whether the content is usable
    Validate(ValidateArgs),
    /// Parse a CSV file and show its inferred schema and column statistics
    Probe(ProbeArgs),
    /// Suggest column bindings for a list of template fields
    Suggest(SuggestArgs),
    /// Apply a mapping set and emit the mapped records
    Map(MapArgs),
    /// Re-serialize a parsed CSV file, optionally with a new delimiter
    Export(ExportArgs),
}

/// Options shared by every command that reads CSV input.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads standard input)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); detected when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Treat the first record as data and name columns column_1..column_N
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Keep whitespace-only lines as all-null records
    #[arg(long = "keep-empty-lines")]
    pub keep_empty_lines: bool,
    /// Preserve leading and trailing whitespace in cells and headers
    #[arg(long = "no-trim")]
    pub no_trim: bool,
    /// Character encoding of the input file (BOM-sniffed, else utf-8, when omitted)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML configuration file with parse, inference, validation and suggestion settings
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit table, schema and statistics as JSON instead of a text summary
    #[arg(long)]
    pub json: bool,
    /// Include the parsed rows in JSON output
    #[arg(long = "include-rows", requires = "json")]
    pub include_rows: bool,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Target field list (YAML or JSON)
    #[arg(long = "fields")]
    pub fields: PathBuf,
    /// Existing mapping set to complete (YAML or JSON)
    #[arg(short = 'm', long = "mappings")]
    pub mappings: Option<PathBuf>,
    /// Destination for the completed mapping set as YAML (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Minimum score a column needs to be suggested
    #[arg(long = "min-score")]
    pub min_score: Option<f64>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Target field list (YAML or JSON)
    #[arg(long = "fields")]
    pub fields: PathBuf,
    /// Mapping set to apply (YAML or JSON)
    #[arg(short = 'm', long = "mappings")]
    pub mappings: PathBuf,
    /// Destination for mapped records (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format for mapped records
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,
    /// Delimiter for CSV output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<char>,
    /// Map even when required fields are unbound
    #[arg(long = "allow-invalid")]
    pub allow_invalid: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination file (`-` writes standard output)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Delimiter to use for output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<char>,
    /// Write the parsed table as JSON instead of CSV
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() || first == '"' || first == '\n' || first == '\r' {
                return Err("Delimiter must be an ASCII character other than a quote or newline".to_string());
            }
            Ok(first)
        }
    }
}
