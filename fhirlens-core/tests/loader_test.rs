// fhirlens Loader Tests
//
// This file contains tests for loading FHIR JSON into typed resource trees.

use fhirlens_core::errors::FhirPathError;
use fhirlens_core::loader::{Loader, LoaderOptions};
use fhirlens_core::model::{FieldValue, Node, PrimitiveType, PrimitiveValue};
use fhirlens_core::schema::Schema;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(path).expect("Failed to read fixture file")
}

fn field_names(node: &Node) -> Vec<String> {
    node.as_composite()
        .expect("Expected composite")
        .fields
        .iter()
        .map(|field| field.name.clone())
        .collect()
}

#[test]
fn test_load_fixture_in_schema_order() {
    let patient = Loader::new(Schema::builtin())
        .load_str(&fixture("patient-example-2.json"))
        .unwrap();

    assert_eq!(patient.resource_type(), Some("Patient"));
    assert_eq!(
        field_names(&patient),
        vec![
            "id",
            "active",
            "name",
            "telecom",
            "gender",
            "birthDate",
            "deceased",
            "address"
        ]
    );
}

#[test]
fn test_lenient_load_skips_malformed_choice() {
    // `"deceased": {"boolean": false}` is not a valid choice element encoding
    let patient = Loader::new(Schema::builtin())
        .load_str(&fixture("patient-example.json"))
        .unwrap();

    let composite = patient.as_composite().unwrap();
    assert!(composite.get("deceased").is_none());
    assert_eq!(composite.get("name").map(FieldValue::len), Some(3));
    assert_eq!(composite.get("telecom").map(FieldValue::len), Some(4));
}

#[test]
fn test_strict_load_rejects_malformed_choice() {
    let result = Loader::new(Schema::builtin())
        .with_options(LoaderOptions { strict: true })
        .load_str(&fixture("patient-example.json"));

    match result {
        Err(FhirPathError::LoadError(message)) => {
            assert!(message.contains("Patient.deceased"), "{}", message)
        }
        other => panic!("Expected LoadError, got {:?}", other),
    }
}

#[test]
fn test_primitive_types_follow_schema() {
    let patient = Loader::new(Schema::builtin())
        .load_str(&fixture("patient-example-2.json"))
        .unwrap();
    let composite = patient.as_composite().unwrap();

    let birth_date = composite.get("birthDate").unwrap().iter().next().unwrap();
    let birth_date = birth_date.as_primitive().unwrap();
    assert_eq!(birth_date.ty, PrimitiveType::Date);
    assert_eq!(birth_date.value, PrimitiveValue::Text("1974-12-25".into()));

    let telecom = composite.get("telecom").unwrap().iter().next().unwrap();
    let rank = telecom
        .as_composite()
        .unwrap()
        .get("rank")
        .unwrap()
        .iter()
        .next()
        .unwrap();
    assert_eq!(rank.as_primitive().unwrap().ty, PrimitiveType::PositiveInt);
    assert_eq!(rank.as_primitive().unwrap().value, PrimitiveValue::Integer(2));
}

#[test]
fn test_scalar_under_repeating_element_becomes_sequence() {
    let patient = Loader::new(Schema::builtin())
        .load(&json!({
            "resourceType": "Patient",
            "name": {"family": "Chalmers"}
        }))
        .unwrap();
    let name = patient.as_composite().unwrap().get("name").unwrap();
    assert!(matches!(name, FieldValue::Sequence(nodes) if nodes.len() == 1));
}

#[test]
fn test_nested_choice_elements() {
    let patient = Loader::new(Schema::builtin())
        .load(&json!({
            "resourceType": "Patient",
            "extension": [{
                "url": "http://example.org/birthPlace",
                "valueAddress": {"city": "PleasantVille"}
            }]
        }))
        .unwrap();
    let extension = patient
        .as_composite()
        .unwrap()
        .get("extension")
        .unwrap()
        .iter()
        .next()
        .unwrap();
    let value = extension
        .as_composite()
        .unwrap()
        .get("value")
        .unwrap()
        .iter()
        .next()
        .unwrap();
    assert_eq!(value.type_name(), "Address");
}

#[test]
fn test_decimals_keep_written_scale() {
    let patient = Loader::new(Schema::builtin())
        .load_str(
            r#"{
                "resourceType": "Patient",
                "extension": [
                    {"url": "http://example.org/weight", "valueDecimal": 1.50},
                    {"url": "http://example.org/ratio", "valueDecimal": 2.5e1}
                ]
            }"#,
        )
        .unwrap();
    let values: Vec<String> = fhirlens_core::evaluate(&patient, "extension.value")
        .unwrap()
        .iter()
        .map(|node| node.to_string())
        .collect();
    assert_eq!(values, vec!["DecimalType[1.50]", "DecimalType[25]"]);
}

#[test]
fn test_duplicate_choice_values_rejected() {
    let result = Loader::new(Schema::builtin()).load(&json!({
        "resourceType": "Patient",
        "deceasedBoolean": true,
        "deceasedDateTime": "2020-01-01"
    }));
    assert!(matches!(result, Err(FhirPathError::LoadError(_))));
}

#[test]
fn test_invalid_json_text() {
    let result = Loader::new(Schema::builtin()).load_str("{\"resourceType\": ");
    assert!(matches!(result, Err(FhirPathError::JsonError(_))));
}

#[test]
fn test_extended_schema_adds_resource_types() {
    let mut schema = Schema::r4();
    schema
        .extend_from_json(
            r#"[{
                "name": "Device",
                "kind": "resource",
                "elements": [
                    {"name": "id", "types": ["id"]},
                    {"name": "status", "types": ["code"], "bindingRequired": true},
                    {"name": "note", "types": ["string"], "max": "*"}
                ]
            }]"#,
        )
        .unwrap();

    let device = Loader::new(&schema)
        .load(&json!({
            "resourceType": "Device",
            "id": "d1",
            "status": "active",
            "note": ["first", "second"]
        }))
        .unwrap();
    let composite = device.as_composite().unwrap();
    assert_eq!(
        composite.get("status"),
        Some(&FieldValue::Single(Node::enumeration("active")))
    );
    assert_eq!(composite.get("note").map(FieldValue::len), Some(2));
}

#[test]
fn test_schema_definitions_require_types() {
    let mut schema = Schema::new();
    let result = schema.extend_from_json(
        r#"[{"name": "Broken", "kind": "datatype", "elements": [{"name": "x", "types": []}]}]"#,
    );
    assert!(matches!(result, Err(FhirPathError::LoadError(_))));
}
