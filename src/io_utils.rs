//! Input decoding and output plumbing for the command-line front end.
//!
//! The core only ever sees a `&str`. This module turns a path (or stdin for
//! `-`) into that string and writes rendered output back to a path or stdout.
//!
//! - **Encoding**: an explicit `--input-encoding` label wins; otherwise a
//!   byte-order mark selects UTF-8 or UTF-16; otherwise UTF-8. Malformed
//!   input is an error rather than silently replaced.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    label
        .map(|value| {
            Encoding::for_label(value.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
        })
        .transpose()
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if is_dash(path) {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .context("Reading standard input")?;
        Ok(buffer)
    } else {
        fs::read(path).with_context(|| format!("Opening input file {path:?}"))
    }
}

pub fn read_stdin_string() -> Result<String> {
    let bytes = read_bytes(Path::new("-"))?;
    decode_bytes(&bytes, None)
}

/// Decodes `bytes`, consuming a matching byte-order mark. With no explicit
/// encoding a BOM picks the encoding, else UTF-8 is assumed.
pub fn decode_bytes(bytes: &[u8], encoding: Option<&'static Encoding>) -> Result<String> {
    let (encoding, body) = match (encoding, Encoding::for_bom(bytes)) {
        (Some(explicit), Some((sniffed, bom_len))) if explicit == sniffed => {
            (explicit, &bytes[bom_len..])
        }
        (Some(explicit), _) => (explicit, bytes),
        (None, Some((sniffed, bom_len))) => (sniffed, &bytes[bom_len..]),
        (None, None) => (UTF_8, bytes),
    };
    debug!("Decoding {} byte(s) as {}", body.len(), encoding.name());
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn read_input(path: &Path, encoding_label: Option<&str>) -> Result<String> {
    let encoding = resolve_encoding(encoding_label)?;
    let bytes = read_bytes(path)?;
    decode_bytes(&bytes, encoding).with_context(|| format!("Decoding input {path:?}"))
}

/// Writes `contents` to `path`, or stdout when the path is absent or `-`.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout().lock()),
    };
    writer
        .write_all(contents.as_bytes())
        .context("Writing output")?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        writer.write_all(b"\n").context("Writing output")?;
    }
    writer.flush().context("Flushing output")
}
