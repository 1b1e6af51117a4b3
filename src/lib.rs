pub mod bind;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod io_utils;
pub mod mapping;
pub mod parser;
pub mod probe;
pub mod schema;
pub mod stats;
pub mod table;
pub mod transform;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs, ValidateArgs},
    config::BinderConfig,
    parser::{ParseOptions, ParsedTable},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_binder", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Probe(args) => probe::execute(&args),
        Commands::Suggest(args) => bind::suggest(&args),
        Commands::Map(args) => bind::map(&args),
        Commands::Export(args) => bind::export(&args),
    }
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let (config, content) = load_input(&args.input)?;
    let report = validate::validate_content(&content, &config.validation);
    let rendered = if args.json {
        export::to_json(&report)?
    } else if report.valid {
        "valid".to_string()
    } else {
        report
            .errors
            .iter()
            .map(|err| format!("invalid: {err}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    io_utils::write_output(None, &rendered)?;
    if !report.valid {
        bail!(
            "{:?} failed validation with {} error(s)",
            args.input.input,
            report.errors.len()
        );
    }
    info!("{:?} passed validation", args.input.input);
    Ok(())
}

/// Command-line flags layered over the configured parse options.
pub(crate) fn parse_options(args: &InputArgs, base: &ParseOptions) -> ParseOptions {
    let mut options = base.clone();
    if let Some(delimiter) = args.delimiter {
        options.delimiter = Some(delimiter);
    }
    if args.no_header {
        options.has_header = false;
    }
    if args.keep_empty_lines {
        options.skip_empty_lines = false;
    }
    if args.no_trim {
        options.trim_whitespace = false;
    }
    options
}

pub(crate) fn load_input(args: &InputArgs) -> Result<(BinderConfig, String)> {
    let config = BinderConfig::load_or_default(args.config.as_deref())?;
    let content = io_utils::read_input(&args.input, args.input_encoding.as_deref())?;
    Ok((config, content))
}

/// Reads and parses the input. Parse warnings are logged; parse errors make
/// the table unusable and are returned as an error.
pub(crate) fn load_table(args: &InputArgs) -> Result<(BinderConfig, ParsedTable)> {
    let (config, content) = load_input(args)?;
    let options = parse_options(args, &config.parse);
    let table = parser::parse(&content, &options);
    debug!(
        "Parsed {:?}: {} row(s), {} column(s), delimiter {}",
        args.input,
        table.row_count(),
        table.column_count(),
        printable_delimiter(table.delimiter)
    );
    for warning in &table.warnings {
        warn!("{warning}");
    }
    if !table.is_usable() {
        bail!(
            "{:?} could not be parsed: {}",
            args.input,
            table.errors.join("; ")
        );
    }
    Ok((config, table))
}

pub(crate) fn printable_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}
