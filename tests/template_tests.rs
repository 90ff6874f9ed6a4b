// tests/template_tests.rs

mod common;

use banded_report::{
    ElementKind, FieldType, GroupTree, KeySpec, Template, TemplateDef, ValidationError, Value,
};
use common::{SALES_TEMPLATE, row};
use pretty_assertions::assert_eq;

fn compile_err(json: &str) -> ValidationError {
    Template::from_json_str(json).unwrap_err()
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_elements_are_in_document_order() {
    let template = Template::from_json_str(SALES_TEMPLATE).unwrap();
    let root = template.element(template.root());
    assert_eq!(root.name, "sales");
    assert_eq!(root.depth, 0);
    assert!(matches!(root.kind, ElementKind::Root { .. }));
    assert_eq!(root.children.len(), 3);

    let customer = template.find("customer").unwrap();
    assert_eq!(customer.depth, 1);
    assert!(matches!(customer.kind, ElementKind::Group(_)));
    assert_eq!(template.find("cust_header").unwrap().depth, 2);
}

#[test]
fn test_generated_names() {
    let template = Template::from_json_str(
        r#"{"children": [
            {"type": "text", "text": "a"},
            {"type": "field", "value": "1"},
            {"type": "band", "children": [{"type": "text", "text": "b"}]},
            {"type": "page_break"}
        ]}"#,
    )
    .unwrap();
    let names: Vec<&str> = template.elements().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["report", "text1", "field2", "band3", "text4", "page_break5"]);
}

#[test]
fn test_schema_follows_group_nesting() {
    let template = Template::from_json_str(SALES_TEMPLATE).unwrap();
    let schema = template.schema();
    let customer = schema.find("customer").unwrap();
    let line = schema.find("line").unwrap();

    assert_eq!(schema.model(customer).keys, KeySpec::Fields(vec!["cust".into()]));
    assert_eq!(schema.model(line).keys, KeySpec::EveryRow);
    assert!(schema.has_descendant(customer, "line"));
    assert!(!schema.has_descendant(line, "customer"));
    assert!(schema.model(line).declares("amount"));
}

#[test]
fn test_definition_can_be_compiled_directly() {
    let def: TemplateDef = serde_json::from_str(SALES_TEMPLATE).unwrap();
    let template = Template::compile(&def).unwrap();
    assert_eq!(template.elements().len(), Template::from_json_str(SALES_TEMPLATE).unwrap().elements().len());
}

#[test]
fn test_typed_fields_coerce_row_values() {
    let template = Template::from_json_str(
        r#"{"children": [
            {"type": "group", "name": "payment", "keys": "*",
             "fields": [{"name": "amount", "type": "bigdecimal"}, {"name": "day", "type": "date"}, "memo"]}
        ]}"#,
    )
    .unwrap();
    let payment = template.schema().find("payment").unwrap();
    let model = template.schema().model(payment);
    assert_eq!(model.field("amount").unwrap().field_type, FieldType::BigDecimal);
    assert_eq!(model.field("memo").unwrap().field_type, FieldType::Unknown);

    let mut tree: GroupTree = template.new_tree();
    let root = tree.root();
    tree.load_rows(
        root,
        &[row(&[
            ("amount", Value::Double(0.1)),
            ("day", "2024-02-29".into()),
            ("memo", Value::Long(3)),
        ])],
    );
    let id = tree.children(root, payment)[0];
    let group = tree.group(id);
    assert_eq!(group.field("amount").unwrap().field_type, FieldType::BigDecimal);
    assert_eq!(
        tree.lookup(id, "amount"),
        banded_report::FieldLookup::Ready(Value::Decimal("0.1".parse().unwrap()))
    );
    assert!(matches!(
        tree.lookup(id, "day"),
        banded_report::FieldLookup::Ready(Value::Date(_))
    ));
    assert_eq!(tree.lookup(id, "memo"), banded_report::FieldLookup::Ready(Value::Long(3)));
}

// ============================================================================
// Validation Errors
// ============================================================================

#[test]
fn test_empty_keys() {
    assert_eq!(
        compile_err(r#"{"children": [{"type": "group", "name": "g", "keys": []}]}"#),
        ValidationError::EmptyKeys { group: "g".into() }
    );
    assert_eq!(
        compile_err(r#"{"children": [{"type": "group", "name": "g", "keys": " , "}]}"#),
        ValidationError::EmptyKeys { group: "g".into() }
    );
}

#[test]
fn test_invalid_keys() {
    assert_eq!(
        compile_err(r#"{"children": [{"type": "group", "name": "g", "keys": "a, *"}]}"#),
        ValidationError::InvalidKeys {
            group: "g".into(),
            keys: "a, *".into()
        }
    );
}

#[test]
fn test_duplicate_group() {
    assert_eq!(
        compile_err(
            r#"{"children": [
                {"type": "group", "name": "g", "keys": "*"},
                {"type": "group", "name": "g", "keys": "*"}
            ]}"#
        ),
        ValidationError::DuplicateGroup("g".into())
    );
}

#[test]
fn test_duplicate_element() {
    assert_eq!(
        compile_err(
            r#"{"children": [
                {"type": "text", "name": "t", "text": "a"},
                {"type": "field", "name": "t", "value": "1"}
            ]}"#
        ),
        ValidationError::DuplicateElement("t".into())
    );
    // groups and elements share one namespace
    assert_eq!(
        compile_err(
            r#"{"children": [
                {"type": "group", "name": "g", "keys": "*"},
                {"type": "text", "name": "g", "text": "a"}
            ]}"#
        ),
        ValidationError::DuplicateElement("g".into())
    );
}

#[test]
fn test_bad_expression_names_node_and_attribute() {
    let err = compile_err(r#"{"children": [{"type": "text", "text": "total {sum(}"}]}"#);
    assert!(matches!(
        err,
        ValidationError::Expression { ref node, attribute: "text", .. } if node == "text1"
    ));

    let err = compile_err(
        r##"{"children": [{"type": "group", "name": "g", "keys": "*", "filter": "#a >"}]}"##,
    );
    assert!(matches!(
        err,
        ValidationError::Expression { ref node, attribute: "filter", .. } if node == "g"
    ));
}

#[test]
fn test_unknown_field_type() {
    assert_eq!(
        compile_err(
            r#"{"children": [{"type": "group", "name": "g", "keys": "*",
                "fields": [{"name": "x", "type": "money"}]}]}"#
        ),
        ValidationError::UnknownFieldType {
            group: "g".into(),
            field: "x".into(),
            type_name: "money".into()
        }
    );
}

#[test]
fn test_order_attributes_are_exclusive() {
    let err = compile_err(
        r#"{"children": [{"type": "group", "name": "g", "keys": ["k"],
            "order": ["k"], "order_by_key": true}]}"#,
    );
    assert!(matches!(err, ValidationError::Attribute { ref node, .. } if node == "g"));
}

#[test]
fn test_auto_field_needs_a_name() {
    let err = compile_err(
        r#"{"children": [{"type": "group", "name": "g", "keys": "*", "children": [
            {"type": "field", "value": "1", "auto": true}
        ]}]}"#,
    );
    assert!(matches!(err, ValidationError::Attribute { .. }));
}

#[test]
fn test_malformed_definitions() {
    assert!(matches!(
        compile_err(r#"{"children": [{"type": "chart"}]}"#),
        ValidationError::Definition(_)
    ));
    assert!(matches!(
        compile_err(r#"{"title": "x"}"#),
        ValidationError::Definition(_)
    ));
    assert!(matches!(compile_err("not json"), ValidationError::Definition(_)));
}
