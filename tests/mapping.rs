mod common;

use std::collections::HashSet;

use csv_binder::{
    data::Value,
    error::MappingError,
    mapping::{
        FieldMapping, SemanticType, SuggestionOptions, TargetField, complete_mappings,
        create_initial_mappings, generate_mapping_suggestions, map_csv_data, remove_mapping,
        upsert_mapping, validate_mapping_compatibility,
    },
    parser::{ParseOptions, parse},
    schema::{Column, ColumnType, Schema, detect_schema},
    transform::{Transform, TransformConfig},
};
use proptest::prelude::*;
use serde_json::json;

use common::{SALES_CSV, field, table_and_schema};

#[test]
fn initial_mapping_matches_names_case_insensitively() {
    let schema = Schema {
        columns: vec![Column {
            name: "Category".to_string(),
            column_type: ColumnType::String,
            nullable: false,
            sample_values: vec!["a".to_string()],
        }],
        delimiter: ',',
    };
    let fields = vec![field("category", Some(SemanticType::Nominal), true)];
    let mappings = create_initial_mappings(&fields, &schema);
    assert_eq!(mappings, vec![FieldMapping::identity("category", "Category")]);
    assert!(mappings[0].transform.is_identity());
}

#[test]
fn initial_mapping_prefers_exact_case_column() {
    let (_, schema) = table_and_schema("NAME,name\nx,y\n");
    let mappings = create_initial_mappings(&[TargetField::new("name")], &schema);
    assert_eq!(mappings, vec![FieldMapping::identity("name", "name")]);
}

#[test]
fn initial_mapping_does_not_guess() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let mappings = create_initial_mappings(&[TargetField::new("price")], &schema);
    assert!(mappings.is_empty());
}

#[test]
fn suggestions_prefer_name_evidence_over_type() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![
        TargetField::new("price").typed(SemanticType::Quantitative),
        TargetField::new("order_date").typed(SemanticType::Temporal),
        TargetField::new("region").typed(SemanticType::Nominal),
    ];
    let suggestions = generate_mapping_suggestions(&fields, &schema, &SuggestionOptions::default());
    assert_eq!(
        suggestions,
        vec![
            FieldMapping::identity("price", "Unit Price"),
            FieldMapping::identity("order_date", "Order Date"),
            FieldMapping::identity("region", "Region"),
        ]
    );
}

#[test]
fn type_compatibility_alone_is_below_threshold() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![TargetField::new("magnitude").typed(SemanticType::Quantitative)];
    let suggestions = generate_mapping_suggestions(&fields, &schema, &SuggestionOptions::default());
    assert!(suggestions.is_empty());

    let permissive = SuggestionOptions { min_score: 10.0 };
    let suggestions = generate_mapping_suggestions(&fields, &schema, &permissive);
    assert_eq!(suggestions, vec![FieldMapping::identity("magnitude", "Units")]);
}

#[test]
fn ties_go_to_the_leftmost_column() {
    let (_, schema) = table_and_schema("amount_a,amount_b\n1,2\n");
    let fields = vec![TargetField::new("amount")];
    let suggestions = generate_mapping_suggestions(&fields, &schema, &SuggestionOptions::default());
    assert_eq!(suggestions, vec![FieldMapping::identity("amount", "amount_a")]);
}

#[test]
fn chosen_columns_leave_the_pool() {
    let (_, schema) = table_and_schema("amount_a,amount_b\n1,2\n");
    let fields = vec![TargetField::new("amount"), TargetField::new("b_amount")];
    let suggestions = generate_mapping_suggestions(&fields, &schema, &SuggestionOptions::default());
    assert_eq!(
        suggestions,
        vec![
            FieldMapping::identity("amount", "amount_a"),
            FieldMapping::identity("b_amount", "amount_b"),
        ]
    );
}

#[test]
fn complete_mappings_keeps_existing_and_never_reuses_columns() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![TargetField::new("region"), TargetField::new("category")];
    let existing = vec![FieldMapping::identity("region", "Category")];
    let completed = complete_mappings(&fields, &schema, &existing, &SuggestionOptions::default());
    assert_eq!(completed[0], existing[0]);
    assert!(
        completed
            .iter()
            .skip(1)
            .all(|m| m.csv_column != "Category"),
        "{completed:?}"
    );
    assert!(completed.iter().all(|m| m.template_field != "category" || m.csv_column != "Category"));
}

#[test]
fn required_unmapped_field_is_an_error() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![
        field("x", Some(SemanticType::Quantitative), true),
        field("y", None, false),
    ];
    let validation = validate_mapping_compatibility(&fields, &[], &schema);
    assert!(!validation.valid);
    assert_eq!(validation.errors.len(), 1);
    assert!(validation.errors[0].contains("'x'"));
}

#[test]
fn type_mismatch_is_only_a_warning() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![field("when", Some(SemanticType::Temporal), true)];
    let mappings = vec![FieldMapping::identity("when", "Region")];
    let validation = validate_mapping_compatibility(&fields, &mappings, &schema);
    assert!(validation.valid);
    assert_eq!(validation.warnings.len(), 1);
    assert!(validation.warnings[0].contains("temporal"));
}

#[test]
fn unknown_column_and_stray_fields_are_reported() {
    let (_, schema) = table_and_schema(SALES_CSV);
    let fields = vec![TargetField::new("a")];
    let mappings = vec![
        FieldMapping::identity("a", "Missing"),
        FieldMapping::identity("b", "Region"),
        FieldMapping::identity("b", "Category"),
    ];
    let validation = validate_mapping_compatibility(&fields, &mappings, &schema);
    assert!(!validation.valid);
    assert!(validation.errors.iter().any(|e| e.contains("unknown column 'Missing'")));
    assert!(validation.warnings.iter().any(|w| w.contains("not a template field")));
    assert!(validation.warnings.iter().any(|w| w.contains("more than once")));
}

#[test]
fn upsert_replaces_in_place_and_remove_drops() {
    let set = vec![
        FieldMapping::identity("x", "a"),
        FieldMapping::identity("y", "b"),
    ];
    let updated = upsert_mapping(&set, FieldMapping::identity("x", "c"));
    assert_eq!(updated[0], FieldMapping::identity("x", "c"));
    assert_eq!(updated.len(), 2);
    let appended = upsert_mapping(&updated, FieldMapping::identity("z", "a"));
    assert_eq!(appended.len(), 3);
    let removed = remove_mapping(&appended, "y");
    assert_eq!(
        removed.iter().map(|m| m.template_field.as_str()).collect::<Vec<_>>(),
        vec!["x", "z"]
    );
    assert_eq!(set.len(), 2);
}

#[test]
fn mapped_records_hold_only_bound_fields() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let mappings = vec![
        FieldMapping::identity("units", "Units"),
        FieldMapping::identity("shipped", "Shipped"),
    ];
    let result = map_csv_data(&table, &schema, &mappings).unwrap();
    assert_eq!(result.mapped_data.len(), 4);
    assert!(result.warnings.is_empty());
    let first = &result.mapped_data[0];
    assert_eq!(first.len(), 2);
    assert_eq!(first.get("units"), Some(&Value::Number(3.0)));
    assert_eq!(first.get("shipped"), Some(&Value::Boolean(true)));
    assert!(!first.contains("region"));
    assert_eq!(result.mapped_data[2].get("units"), Some(&Value::Null));
}

#[test]
fn last_mapping_for_a_field_wins() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let mappings = vec![
        FieldMapping::identity("label", "Region"),
        FieldMapping::identity("label", "Category"),
    ];
    let result = map_csv_data(&table, &schema, &mappings).unwrap();
    assert_eq!(
        result.mapped_data[0].get("label"),
        Some(&Value::String("Hardware".to_string()))
    );
    assert_eq!(result.mapped_data[0].len(), 1);
}

#[test]
fn unknown_column_is_a_hard_failure() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let err = map_csv_data(&table, &schema, &[FieldMapping::identity("x", "Nope")]).unwrap_err();
    assert_eq!(
        err,
        MappingError::UnknownColumn {
            template_field: "x".to_string(),
            column: "Nope".to_string(),
        }
    );
}

#[test]
fn unusable_table_and_stale_schema_are_rejected() {
    let broken = parse("a,b\n1,\"open\n", &ParseOptions::default());
    let schema = detect_schema(&broken);
    assert_eq!(
        map_csv_data(&broken, &schema, &[]).unwrap_err(),
        MappingError::UnusableTable(1)
    );

    let (table, _) = table_and_schema(SALES_CSV);
    let (_, other_schema) = table_and_schema("x,y\n1,2\n");
    assert_eq!(
        map_csv_data(&table, &other_schema, &[]).unwrap_err(),
        MappingError::SchemaMismatch
    );
}

#[test]
fn transform_failures_are_aggregated_into_warnings() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let mut config = TransformConfig::new();
    config.insert("decimals".to_string(), json!(2));
    let mappings = vec![
        FieldMapping::identity("region", "Region").with_transform(Transform::format(config)),
    ];
    let result = map_csv_data(&table, &schema, &mappings).unwrap();
    assert_eq!(
        result.mapped_data[0].get("region"),
        Some(&Value::String("North".to_string()))
    );
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("4 row(s)"), "{}", result.warnings[0]);
}

#[test]
fn invalid_expression_degrades_column_to_identity_once() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let mappings = vec![
        FieldMapping::identity("units", "Units")
            .with_transform(Transform::calculate("str::to_uppercase(units)")),
    ];
    let result = map_csv_data(&table, &schema, &mappings).unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("using identity"));
    assert_eq!(result.mapped_data[1].get("units"), Some(&Value::Number(10.0)));
}

#[test]
fn calculate_reads_other_columns_of_the_row() {
    let (table, schema) = table_and_schema(SALES_CSV);
    let mappings = vec![
        FieldMapping::identity("revenue", "Units")
            .with_transform(Transform::calculate("units * unit_price")),
    ];
    let result = map_csv_data(&table, &schema, &mappings).unwrap();
    assert_eq!(result.mapped_data[1].get("revenue"), Some(&Value::Number(45.0)));
    assert_eq!(result.mapped_data[2].get("revenue"), Some(&Value::Null));
    assert!(result.warnings.is_empty());
}

#[test]
fn mapping_result_serializes_as_plain_records() {
    let (table, schema) = table_and_schema("name,value\nApple,10\n");
    let result = map_csv_data(
        &table,
        &schema,
        &[
            FieldMapping::identity("y", "value"),
            FieldMapping::identity("x", "name"),
        ],
    )
    .unwrap();
    let json = serde_json::to_string(&result).unwrap();
    assert_eq!(json, r#"{"mappedData":[{"y":10,"x":"Apple"}],"warnings":[]}"#);
}

#[test]
fn field_mapping_defaults_to_identity_transform() {
    let mapping: FieldMapping =
        serde_json::from_str(r#"{"templateField":"x","csvColumn":"a"}"#).unwrap();
    assert_eq!(mapping, FieldMapping::identity("x", "a"));
}

fn arb_column_type() -> impl Strategy<Value = ColumnType> {
    prop_oneof![
        Just(ColumnType::String),
        Just(ColumnType::Number),
        Just(ColumnType::Boolean),
        Just(ColumnType::Date),
    ]
}

fn arb_semantic() -> impl Strategy<Value = Option<SemanticType>> {
    prop_oneof![
        Just(None),
        Just(Some(SemanticType::Quantitative)),
        Just(Some(SemanticType::Nominal)),
        Just(Some(SemanticType::Temporal)),
        Just(Some(SemanticType::Ordinal)),
    ]
}

const NAME_PARTS: &[&str] = &["amount", "total", "date", "name", "id", "price", "region", "x"];

fn arb_name() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(NAME_PARTS), 1..3).prop_map(|parts| parts.join("_"))
}

proptest! {
    #[test]
    fn suggestions_never_reuse_a_column(
        column_names in prop::collection::hash_set(arb_name(), 1..8),
        column_types in prop::collection::vec(arb_column_type(), 8),
        field_specs in prop::collection::vec((arb_name(), arb_semantic()), 0..10),
        min_score in 0.0f64..60.0,
    ) {
        let schema = Schema {
            columns: column_names
                .into_iter()
                .zip(column_types)
                .map(|(name, column_type)| Column {
                    name,
                    column_type,
                    nullable: false,
                    sample_values: Vec::new(),
                })
                .collect(),
            delimiter: ',',
        };
        let fields: Vec<TargetField> = field_specs
            .into_iter()
            .map(|(name, semantic_type)| field(&name, semantic_type, false))
            .collect();
        let suggestions =
            generate_mapping_suggestions(&fields, &schema, &SuggestionOptions { min_score });
        let columns: HashSet<&str> = suggestions.iter().map(|m| m.csv_column.as_str()).collect();
        prop_assert_eq!(columns.len(), suggestions.len());
        for mapping in &suggestions {
            prop_assert!(schema.column(&mapping.csv_column).is_some());
        }
    }
}
