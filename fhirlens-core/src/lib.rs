// fhirlens Core Implementation
//
// This crate loads FHIR JSON resources into typed trees and evaluates path
// expressions (field navigation, type filters and a small function set)
// against them.

pub mod errors;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod loader;
pub mod model;
pub mod parser;
pub mod render;
pub mod schema;

/// FHIR release the bundled schema describes
pub const FHIR_VERSION: &str = "R4";

pub use errors::FhirPathError;
pub use evaluator::{LoggingVisitor, NoopVisitor, StepVisitor};
pub use loader::{Loader, LoaderOptions};
pub use model::{Collection, Composite, FieldValue, Node, Primitive, PrimitiveType};
pub use parser::ParsedExpression;
pub use schema::Schema;

/// Evaluates a path expression against a resource tree
///
/// The expression is parsed before the tree is touched, so syntax errors are
/// reported without any navigation taking place.
pub fn evaluate<'a>(resource: &'a Node, expression: &str) -> Result<Collection<'a>, FhirPathError> {
    evaluate_with_visitor(resource, expression, &NoopVisitor::new())
}

/// Evaluates a path expression with a custom visitor
///
/// The visitor sees every step with its input collection and its result,
/// which is useful for debugging or tracing evaluation.
pub fn evaluate_with_visitor<'a>(
    resource: &'a Node,
    expression: &str,
    visitor: &dyn StepVisitor,
) -> Result<Collection<'a>, FhirPathError> {
    evaluator::evaluate_expression_with_visitor(resource, expression, Schema::builtin(), visitor)
}

/// Loads a FHIR JSON resource with the bundled schema and evaluates an expression on it
///
/// The tree is dropped on return, so the result owns its nodes.
pub fn evaluate_json(
    expression: &str,
    resource: &serde_json::Value,
) -> Result<Collection<'static>, FhirPathError> {
    let schema = Schema::builtin();
    let parsed = parser::parse_str(expression, schema)?;
    let tree = Loader::new(schema).load(resource)?;
    parsed.evaluate(&tree).map(Collection::into_owned)
}

/// Parses an expression against the bundled schema without evaluating it
pub fn parse_expression(expression: &str) -> Result<ParsedExpression, FhirPathError> {
    parser::parse_str(expression, Schema::builtin())
}
