// fhirlens Parser Tests
//
// This file contains tests for the path expression parser.

use fhirlens_core::functions::Function;
use fhirlens_core::lexer::tokenize;
use fhirlens_core::parse_expression;
use fhirlens_core::parser::{parse, Argument, Invocation, Literal, Predicate, Step};
use fhirlens_core::schema::Schema;
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;

fn field(name: &str) -> Step {
    Step::Field(name.to_string())
}

fn call(function: Function) -> Step {
    Step::Invoke(Invocation {
        function,
        argument: Argument::None,
    })
}

fn where_step(path: &[&str], literal: Literal) -> Step {
    Step::Invoke(Invocation {
        function: Function::Where,
        argument: Argument::Predicate(Predicate {
            path: path.iter().map(|s| s.to_string()).collect(),
            literal,
        }),
    })
}

#[test]
fn test_parse_identifier() {
    let tokens = tokenize("name").unwrap();
    let parsed = parse(&tokens, Schema::builtin()).unwrap();
    assert_eq!(parsed.steps(), &[field("name")]);
}

#[test]
fn test_parse_type_filter_prefix() {
    let parsed = parse_expression("Patient.name.children()").unwrap();
    assert_eq!(
        parsed.steps(),
        &[
            Step::TypeFilter("Patient".to_string()),
            field("name"),
            call(Function::Children),
        ]
    );
}

#[test]
fn test_resource_name_after_first_segment_is_a_field() {
    let parsed = parse_expression("contact.Patient").unwrap();
    assert_eq!(parsed.steps(), &[field("contact"), field("Patient")]);
}

#[test]
fn test_unknown_capitalized_name_is_resolved_at_evaluation() {
    let parsed = parse_expression("Observation.status").unwrap();
    assert_eq!(
        parsed.steps(),
        &[Step::TypeOrField("Observation".to_string()), field("status")]
    );

    // Only the leading segment can name a type
    let parsed = parse_expression("contained.Observation").unwrap();
    assert_eq!(parsed.steps(), &[field("contained"), field("Observation")]);

    let parsed = parse_expression("name.family").unwrap();
    assert_eq!(parsed.steps()[0], field("name"));
}

#[test]
fn test_parse_count() {
    let parsed = parse_expression("name.count()").unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed.steps()[1], call(Function::Count));
}

#[rstest]
#[case("name.where(use='official')", &["use"], Literal::String("official".into()))]
#[case("name.where('official' = use)", &["use"], Literal::String("official".into()))]
#[case("name.where(period.end = '2002')", &["period", "end"], Literal::String("2002".into()))]
#[case("telecom.where(rank = 2)", &["rank"], Literal::Integer(2))]
#[case("telecom.where(rank = 2.5)", &["rank"], Literal::Decimal(Decimal::new(25, 1)))]
#[case("name.where(active = true)", &["active"], Literal::Boolean(true))]
fn test_parse_where_predicates(
    #[case] expression: &str,
    #[case] path: &[&str],
    #[case] literal: Literal,
) {
    let parsed = parse_expression(expression).unwrap();
    assert_eq!(parsed.steps()[1], where_step(path, literal));
}

#[test]
fn test_delimited_and_keyword_field_names() {
    let parsed = parse_expression("`given`.contains").unwrap();
    assert_eq!(parsed.steps(), &[field("given"), field("contains")]);
}

#[rstest]
#[case("", "Empty expression")]
#[case("name.", "Expected identifier after '.'")]
#[case("name.foo()", "Unknown function: foo")]
#[case("name.count(1)", "'count' function expects 0 arguments")]
#[case("name.where()", "'where' function expects a predicate argument")]
#[case("name.where(use='x'", "Unmatched '('")]
#[case("name.count())", "Unmatched ')'")]
#[case("name.where(use != 'x')", "Unsupported operator '!='")]
#[case("name | telecom", "Unsupported operator '|'")]
#[case("name.where(use.count() = 1)", "Function calls are not supported")]
#[case("name.where(use = family)", "Expected literal in predicate")]
#[case("(name)", "Expected identifier")]
fn test_syntax_errors(#[case] expression: &str, #[case] message: &str) {
    let err = parse_expression(expression).unwrap_err();
    assert!(err.is_syntax_error(), "expected syntax error, got {}", err);
    assert!(
        err.to_string().contains(message),
        "'{}' does not mention '{}'",
        err,
        message
    );
}

#[test]
fn test_custom_schema_drives_type_filters() {
    let mut schema = Schema::new();
    schema
        .extend_from_json(
            r#"[{"name": "Device", "kind": "resource", "elements": [
                {"name": "id", "types": ["id"]}
            ]}]"#,
        )
        .unwrap();

    let tokens = tokenize("Device.id").unwrap();
    let parsed = parse(&tokens, &schema).unwrap();
    assert_eq!(
        parsed.steps(),
        &[Step::TypeFilter("Device".to_string()), field("id")]
    );

    // Patient is unknown to this schema
    let tokens = tokenize("Patient.id").unwrap();
    let parsed = parse(&tokens, &schema).unwrap();
    assert_eq!(parsed.steps()[0], Step::TypeOrField("Patient".to_string()));
}
