#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_binder::{
    mapping::{SemanticType, TargetField},
    parser::{self, ParseOptions, ParsedTable},
    schema::{self, Schema},
};
use tempfile::{TempDir, tempdir};

pub const FRUIT_CSV: &str = "name,value\nApple,10\nBanana,20\n";

pub const SALES_CSV: &str = "\
Region,Category,Order Date,Units,Unit Price,Shipped
North,Hardware,2024-01-05,3,19.99,yes
South,Software,2024-01-06,10,4.5,no
North,Software,2024-02-11,,4.5,yes
East,Hardware,2024-03-01,7,19.99,no
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }
}

pub fn parse_default(content: &str) -> ParsedTable {
    parser::parse(content, &ParseOptions::default())
}

pub fn table_and_schema(content: &str) -> (ParsedTable, Schema) {
    let table = parse_default(content);
    assert!(table.is_usable(), "unexpected parse errors: {:?}", table.errors);
    let schema = schema::detect_schema(&table);
    (table, schema)
}

pub fn field(name: &str, semantic_type: Option<SemanticType>, required: bool) -> TargetField {
    TargetField {
        name: name.to_string(),
        semantic_type,
        required,
        description: None,
    }
}

/// Cells of one row as plain options, for compact assertions.
pub fn row_cells(table: &ParsedTable, row: usize) -> Vec<Option<&str>> {
    table.rows[row]
        .cells()
        .iter()
        .map(|cell| cell.as_deref())
        .collect()
}
