//! Delimiter detection, quote-aware tokenizing, and assembly of [`ParsedTable`].
//!
//! Parsing never fails outright. Malformed input is reported through the
//! table's `errors` (fatal for downstream mapping) and `warnings` (per-row
//! anomalies that were repaired), and whatever could be read is returned so a
//! preview can still render it.

use std::{collections::HashSet, iter::Peekable, str::Chars};

use log::debug;
use serde::{
    Deserialize, Serialize, Serializer,
    ser::{SerializeMap, SerializeStruct},
};

/// Candidate delimiters in tie-break priority order.
pub const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];
pub const DEFAULT_DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// First non-empty record supplies the column names.
    pub has_header: bool,
    /// Drop whitespace-only lines instead of emitting all-null records.
    pub skip_empty_lines: bool,
    /// Strip leading/trailing whitespace from every cell and header.
    pub trim_whitespace: bool,
    /// Explicit delimiter; detected from the first line when absent.
    pub delimiter: Option<char>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            skip_empty_lines: true,
            trim_whitespace: true,
            delimiter: None,
        }
    }
}

/// One data row, positionally aligned with [`ParsedTable::headers`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    cells: Vec<Option<String>>,
}

impl Record {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|cell| cell.as_deref())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
    pub delimiter: char,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// A table with parse errors must not be fed to inference or mapping.
    pub fn is_usable(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.header_index(column)?;
        self.rows.get(row).and_then(|record| record.get(index))
    }

    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |record| record.get(index))
    }
}

struct RecordView<'a> {
    headers: &'a [String],
    record: &'a Record,
}

impl Serialize for RecordView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (idx, header) in self.headers.iter().enumerate() {
            map.serialize_entry(header, &self.record.get(idx))?;
        }
        map.end()
    }
}

struct RowsView<'a>(&'a ParsedTable);

impl Serialize for RowsView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.rows.iter().map(|record| RecordView {
            headers: &self.0.headers,
            record,
        }))
    }
}

impl Serialize for ParsedTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ParsedTable", 7)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("rows", &RowsView(self))?;
        state.serialize_field("rowCount", &self.row_count())?;
        state.serialize_field("columnCount", &self.column_count())?;
        state.serialize_field("delimiter", &self.delimiter)?;
        state.serialize_field("errors", &self.errors)?;
        state.serialize_field("warnings", &self.warnings)?;
        state.end()
    }
}

/// Picks the candidate delimiter that occurs most often (outside quotes) in
/// the first non-empty record. Quoted line breaks do not end that record.
/// Ties go to the earlier candidate.
pub fn detect_delimiter(content: &str) -> char {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    let mut has_content = false;
    for ch in content.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_content = true;
            }
            _ if in_quotes => {}
            '\n' | '\r' if has_content => break,
            // Whitespace-only line; a tab there is not a delimiter.
            '\n' | '\r' => counts = [0; DELIMITER_CANDIDATES.len()],
            other => {
                if let Some(slot) = DELIMITER_CANDIDATES.iter().position(|c| *c == other) {
                    counts[slot] += 1;
                }
                if !other.is_whitespace() {
                    has_content = true;
                }
            }
        }
    }

    let mut best = DEFAULT_DELIMITER;
    let mut best_count = 0usize;
    for (candidate, count) in DELIMITER_CANDIDATES.iter().zip(counts) {
        if count > best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}

pub fn parse(content: &str, options: &ParseOptions) -> ParsedTable {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(content));
    debug!("Parsing with delimiter {delimiter:?}");

    let Tokenized {
        mut records,
        error,
    } = Tokenizer::new(content, delimiter).run();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    if let Some(error) = error {
        errors.push(error);
    }

    if options.trim_whitespace {
        for record in &mut records {
            for field in &mut record.fields {
                let trimmed = field.trim();
                if trimmed.len() != field.len() {
                    *field = trimmed.to_string();
                }
            }
        }
    }

    let Some(first_index) = records.iter().position(|record| !record.blank) else {
        if errors.is_empty() {
            errors.push("Input contains no records".to_string());
        }
        return ParsedTable {
            headers: Vec::new(),
            rows: Vec::new(),
            delimiter,
            errors,
            warnings,
        };
    };

    let (headers, data_start) = if options.has_header {
        let raw = std::mem::take(&mut records[first_index].fields);
        (build_headers(raw, &mut warnings), first_index + 1)
    } else {
        let count = records[first_index].fields.len();
        (synthesize_headers(count), first_index)
    };

    let expected = headers.len();
    let mut rows = Vec::with_capacity(records.len().saturating_sub(data_start));
    for record in records.into_iter().skip(data_start) {
        if record.blank {
            if !options.skip_empty_lines {
                rows.push(Record::new(vec![None; expected]));
            }
            continue;
        }
        let row_number = rows.len() + 1;
        let found = record.fields.len();
        let mut cells: Vec<Option<String>> = record.fields.into_iter().map(Some).collect();
        if found < expected {
            warnings.push(format!(
                "Row {row_number} (line {}) has {found} field(s), expected {expected}; missing values set to null",
                record.line
            ));
            cells.resize(expected, None);
        } else if found > expected {
            warnings.push(format!(
                "Row {row_number} (line {}) has {found} field(s), expected {expected}; extra values dropped",
                record.line
            ));
            cells.truncate(expected);
        }
        rows.push(Record::new(cells));
    }

    debug!(
        "Parsed {} row(s) across {} column(s) with {} warning(s)",
        rows.len(),
        headers.len(),
        warnings.len()
    );
    ParsedTable {
        headers,
        rows,
        delimiter,
        errors,
        warnings,
    }
}

fn synthesize_headers(count: usize) -> Vec<String> {
    (1..=count).map(|idx| format!("column_{idx}")).collect()
}

fn build_headers(raw: Vec<String>, warnings: &mut Vec<String>) -> Vec<String> {
    let original: HashSet<String> = raw.iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut headers = Vec::with_capacity(raw.len());

    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name
        };
        if seen.insert(base.clone()) {
            headers.push(base);
            continue;
        }
        let mut suffix = 2usize;
        let renamed = loop {
            let candidate = format!("{base}_{suffix}");
            if !original.contains(&candidate) && !seen.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        warnings.push(format!(
            "Duplicate header '{base}' at position {} renamed to '{renamed}'",
            idx + 1
        ));
        seen.insert(renamed.clone());
        headers.push(renamed);
    }
    headers
}

#[derive(Debug)]
struct RawRecord {
    fields: Vec<String>,
    line: usize,
    blank: bool,
}

struct Tokenized {
    records: Vec<RawRecord>,
    error: Option<String>,
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    delimiter: char,
    line: usize,
    records: Vec<RawRecord>,
    fields: Vec<String>,
    field: String,
    field_quoted: bool,
    record_quoted: bool,
    record_started: bool,
    record_line: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(content: &'a str, delimiter: char) -> Self {
        Self {
            chars: content.chars().peekable(),
            delimiter,
            line: 1,
            records: Vec::new(),
            fields: Vec::new(),
            field: String::new(),
            field_quoted: false,
            record_quoted: false,
            record_started: false,
            record_line: 1,
        }
    }

    fn run(mut self) -> Tokenized {
        while let Some(ch) = self.chars.next() {
            self.record_started = true;
            if ch == '"' && self.can_open_quote() {
                if let Err(error) = self.read_quoted() {
                    return Tokenized {
                        records: self.records,
                        error: Some(error),
                    };
                }
                continue;
            }
            match ch {
                c if c == self.delimiter => self.end_field(),
                '\r' | '\n' => {
                    if ch == '\r' && self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                    }
                    self.end_record();
                    self.line += 1;
                    self.record_line = self.line;
                }
                other => self.field.push(other),
            }
        }
        if self.record_started {
            self.end_record();
        }
        Tokenized {
            records: self.records,
            error: None,
        }
    }

    /// A quote opens a quoted field only at the start of a field, optionally
    /// after blanks.
    fn can_open_quote(&self) -> bool {
        !self.field_quoted && self.field.chars().all(|c| c == ' ' || c == '\t')
    }

    fn read_quoted(&mut self) -> Result<(), String> {
        let opened_on = self.line;
        self.field.clear();
        self.field_quoted = true;
        self.record_quoted = true;
        while let Some(ch) = self.chars.next() {
            match ch {
                '"' if self.chars.peek() == Some(&'"') => {
                    self.chars.next();
                    self.field.push('"');
                }
                '"' => return Ok(()),
                '\n' => {
                    self.line += 1;
                    self.field.push('\n');
                }
                '\r' => {
                    if self.chars.peek() != Some(&'\n') {
                        self.line += 1;
                    }
                    self.field.push('\r');
                }
                other => self.field.push(other),
            }
        }
        Err(format!(
            "Unterminated quoted field starting on line {opened_on}"
        ))
    }

    fn end_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.field));
        self.field_quoted = false;
    }

    fn end_record(&mut self) {
        self.end_field();
        let fields = std::mem::take(&mut self.fields);
        let blank = !self.record_quoted && fields.len() == 1 && fields[0].trim().is_empty();
        self.records.push(RawRecord {
            fields,
            line: self.record_line,
            blank,
        });
        self.record_quoted = false;
        self.record_started = false;
    }
}
