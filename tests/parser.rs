mod common;

use csv_binder::parser::{ParseOptions, detect_delimiter, parse};

use common::{FRUIT_CSV, parse_default, row_cells};

#[test]
fn simple_table_parses_with_defaults() {
    let table = parse_default(FRUIT_CSV);
    assert!(table.errors.is_empty());
    assert!(table.warnings.is_empty());
    assert_eq!(table.headers, vec!["name", "value"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.delimiter, ',');
    assert_eq!(row_cells(&table, 1), vec![Some("Banana"), Some("20")]);
}

#[test]
fn short_row_is_padded_with_null_and_warned() {
    let table = parse_default("a,b\n1\n");
    assert!(table.errors.is_empty());
    assert_eq!(table.row_count(), 1);
    assert_eq!(row_cells(&table, 0), vec![Some("1"), None]);
    assert_eq!(table.warnings.len(), 1);
    assert!(table.warnings[0].contains("Row 1 (line 2)"), "{}", table.warnings[0]);
}

#[test]
fn long_row_is_truncated_and_warned() {
    let table = parse_default("a,b\n1,2,3\n");
    assert_eq!(row_cells(&table, 0), vec![Some("1"), Some("2")]);
    assert!(table.warnings[0].contains("extra values dropped"));
}

#[test]
fn delimiter_detection_prefers_most_frequent_candidate() {
    assert_eq!(detect_delimiter("a;b;c\n1;2;3\n"), ';');
    assert_eq!(detect_delimiter("a\tb\tc\n"), '\t');
    assert_eq!(detect_delimiter("a|b\n"), '|');
    assert_eq!(detect_delimiter("single\n"), ',');
}

#[test]
fn delimiter_detection_breaks_ties_by_priority() {
    assert_eq!(detect_delimiter("a;b,c\n"), ',');
    assert_eq!(detect_delimiter("a|b;c\n"), ';');
}

#[test]
fn delimiter_detection_ignores_quoted_candidates_and_blank_lines() {
    assert_eq!(detect_delimiter("\n\n\"x;y;z\",b\n"), ',');
}

#[test]
fn quoted_line_break_in_header_does_not_hide_the_delimiter() {
    let table = parse_default("\"x\ny\";z;w\n1;2;3\n");
    assert!(table.errors.is_empty(), "{:?}", table.errors);
    assert_eq!(table.delimiter, ';');
    assert_eq!(table.headers, vec!["x\ny", "z", "w"]);
    assert_eq!(row_cells(&table, 0), vec![Some("1"), Some("2"), Some("3")]);
}

#[test]
fn semicolon_tables_keep_decimal_commas() {
    let table = parse_default("item;price\nTea;1,50\n");
    assert_eq!(table.delimiter, ';');
    assert_eq!(row_cells(&table, 0), vec![Some("Tea"), Some("1,50")]);
}

#[test]
fn explicit_delimiter_overrides_detection() {
    let options = ParseOptions {
        delimiter: Some('|'),
        ..ParseOptions::default()
    };
    let table = parse("a,b|c\n1,2|3\n", &options);
    assert_eq!(table.headers, vec!["a,b", "c"]);
}

#[test]
fn quoted_fields_keep_delimiters_quotes_and_newlines() {
    let table = parse_default("id,text\n1,\"a, b\"\n2,\"say \"\"hi\"\"\"\n3,\"line one\nline two\"\n");
    assert!(table.errors.is_empty());
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.cell(0, "text"), Some("a, b"));
    assert_eq!(table.cell(1, "text"), Some("say \"hi\""));
    assert_eq!(table.cell(2, "text"), Some("line one\nline two"));
}

#[test]
fn crlf_and_lone_cr_end_records() {
    let crlf = parse_default("a,b\r\n1,2\r\n3,4\r\n");
    assert_eq!(crlf.row_count(), 2);
    assert_eq!(crlf.cell(1, "b"), Some("4"));
    let cr = parse_default("a,b\r1,2\r");
    assert_eq!(cr.row_count(), 1);
    assert_eq!(cr.cell(0, "a"), Some("1"));
}

#[test]
fn missing_final_newline_still_yields_last_record() {
    let table = parse_default("a,b\n1,2");
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.cell(0, "b"), Some("2"));
}

#[test]
fn unterminated_quote_reports_error_and_keeps_earlier_rows() {
    let table = parse_default("a,b\n1,2\n3,\"open\n4,5\n");
    assert_eq!(table.errors.len(), 1);
    assert!(table.errors[0].contains("Unterminated"), "{}", table.errors[0]);
    assert!(!table.is_usable());
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.cell(0, "a"), Some("1"));
}

#[test]
fn empty_input_has_no_records_error() {
    for content in ["", "\n\n", "   \n"] {
        let table = parse_default(content);
        assert_eq!(table.errors, vec!["Input contains no records".to_string()]);
        assert_eq!(table.row_count(), 0);
    }
}

#[test]
fn header_only_input_is_usable_with_zero_rows() {
    let table = parse_default("a,b\n");
    assert!(table.is_usable());
    assert_eq!(table.headers, vec!["a", "b"]);
    assert_eq!(table.row_count(), 0);
}

#[test]
fn duplicate_and_empty_headers_are_renamed() {
    let table = parse_default("x,x,,x_2,x\n1,2,3,4,5\n");
    assert_eq!(table.headers, vec!["x", "x_3", "column_3", "x_2", "x_4"]);
    assert!(table.warnings.iter().any(|w| w.contains("Duplicate header 'x'")));
    assert_eq!(table.cell(0, "x_4"), Some("5"));
}

#[test]
fn no_header_mode_synthesizes_names() {
    let options = ParseOptions {
        has_header: false,
        ..ParseOptions::default()
    };
    let table = parse("1,2,3\n4,5,6\n", &options);
    assert_eq!(table.headers, vec!["column_1", "column_2", "column_3"]);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn blank_lines_are_skipped_or_kept_as_null_rows() {
    let content = "a,b\n1,2\n\n   \n3,4\n";
    let skipped = parse_default(content);
    assert_eq!(skipped.row_count(), 2);

    let options = ParseOptions {
        skip_empty_lines: false,
        ..ParseOptions::default()
    };
    let kept = parse(content, &options);
    assert_eq!(kept.row_count(), 4);
    assert_eq!(row_cells(&kept, 1), vec![None, None]);
    assert_eq!(row_cells(&kept, 3), vec![Some("3"), Some("4")]);
}

#[test]
fn trimming_can_be_disabled() {
    let content = " a , b \n 1 , 2 \n";
    let trimmed = parse_default(content);
    assert_eq!(trimmed.headers, vec!["a", "b"]);
    assert_eq!(trimmed.cell(0, "a"), Some("1"));

    let options = ParseOptions {
        trim_whitespace: false,
        ..ParseOptions::default()
    };
    let raw = parse(content, &options);
    assert_eq!(raw.headers, vec![" a ", " b "]);
    assert_eq!(raw.cell(0, " b "), Some(" 2 "));
}

#[test]
fn leading_bom_is_stripped() {
    let table = parse_default("\u{feff}name,value\nA,1\n");
    assert_eq!(table.headers[0], "name");
}

#[test]
fn serialized_table_lists_rows_as_header_maps() {
    let table = parse_default(FRUIT_CSV);
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json["rowCount"], 2);
    assert_eq!(json["columnCount"], 2);
    assert_eq!(json["rows"][0]["name"], "Apple");
    assert_eq!(json["rows"][1]["value"], "20");
}
