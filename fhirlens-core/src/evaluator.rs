// fhirlens Evaluator
//
// This module folds a parsed expression's steps over collections, starting
// from the root resource.

use crate::errors::FhirPathError;
use crate::model::{Collection, Node};
use crate::parser::{parse_str, ParsedExpression, Step};
use crate::schema::Schema;
use std::cell::Cell;

#[cfg(feature = "trace")]
use log::{debug, trace};

/// Trait for observing steps during evaluation
pub trait StepVisitor {
    /// Called before a step is applied to its input
    fn before_step(&self, step: &Step, input: &Collection<'_>);

    /// Called after a step has produced its result
    fn after_step(&self, step: &Step, result: &Result<Collection<'_>, FhirPathError>);
}

/// A visitor that logs each evaluation step
pub struct LoggingVisitor {
    index: Cell<usize>,
}

impl Default for LoggingVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingVisitor {
    /// Creates a new logging visitor
    pub fn new() -> Self {
        Self {
            index: Cell::new(0),
        }
    }
}

impl StepVisitor for LoggingVisitor {
    fn before_step(&self, _step: &Step, _input: &Collection<'_>) {
        #[cfg(feature = "trace")]
        trace!(
            "step {}: {:?} on {} node(s)",
            self.index.get(),
            _step,
            _input.len()
        );
    }

    fn after_step(&self, _step: &Step, _result: &Result<Collection<'_>, FhirPathError>) {
        #[cfg(feature = "trace")]
        match _result {
            Ok(value) => trace!("step {} produced {}", self.index.get(), value),
            Err(err) => debug!("step {} failed: {}", self.index.get(), err),
        }
        self.index.set(self.index.get() + 1);
    }
}

/// A no-op visitor that does nothing
pub struct NoopVisitor;

impl Default for NoopVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopVisitor {
    /// Creates a new no-op visitor
    pub fn new() -> Self {
        Self
    }
}

impl StepVisitor for NoopVisitor {
    fn before_step(&self, _step: &Step, _input: &Collection<'_>) {}

    fn after_step(&self, _step: &Step, _result: &Result<Collection<'_>, FhirPathError>) {}
}

/// Field navigation: the named field's values for every composite input,
/// flattened one level, in input order
pub fn navigate<'a>(input: &Collection<'a>, name: &str) -> Collection<'a> {
    input.expand(|node| {
        node.as_composite()
            .and_then(|composite| composite.get(name))
            .map(|value| value.iter().collect())
            .unwrap_or_default()
    })
}

/// Keeps resources whose type equals `type_name`
fn filter_type<'a>(input: Collection<'a>, type_name: &str) -> Collection<'a> {
    input
        .into_iter()
        .filter(|node| node.resource_type() == Some(type_name))
        .collect()
}

/// Applies one step to the current collection
pub fn evaluate_step<'a>(input: Collection<'a>, step: &Step) -> Result<Collection<'a>, FhirPathError> {
    match step {
        Step::Field(name) => Ok(navigate(&input, name)),
        Step::TypeFilter(type_name) => Ok(filter_type(input, type_name)),
        Step::TypeOrField(name) => {
            if input.iter().any(|node| node.resource_type() == Some(name.as_str())) {
                Ok(filter_type(input, name))
            } else {
                Ok(navigate(&input, name))
            }
        }
        Step::Invoke(invocation) => invocation.function.apply(input, &invocation.argument),
    }
}

/// Evaluates a parsed expression against a resource tree
pub fn evaluate_parsed<'a>(
    root: &'a Node,
    expression: &ParsedExpression,
    visitor: &dyn StepVisitor,
) -> Result<Collection<'a>, FhirPathError> {
    let mut current = Collection::from_ref(root);
    for step in expression.steps() {
        visitor.before_step(step, &current);
        let result = evaluate_step(current, step);
        visitor.after_step(step, &result);
        current = result?;
    }
    Ok(current)
}

impl ParsedExpression {
    /// Evaluates this expression against a resource tree
    pub fn evaluate<'a>(&self, root: &'a Node) -> Result<Collection<'a>, FhirPathError> {
        evaluate_parsed(root, self, &NoopVisitor::new())
    }
}

/// Evaluates an expression string using the bundled schema
pub fn evaluate_expression<'a>(
    root: &'a Node,
    expression: &str,
) -> Result<Collection<'a>, FhirPathError> {
    evaluate_expression_with_visitor(root, expression, Schema::builtin(), &NoopVisitor::new())
}

/// Evaluates an expression string with an explicit schema and visitor
pub fn evaluate_expression_with_visitor<'a>(
    root: &'a Node,
    expression: &str,
    schema: &Schema,
    visitor: &dyn StepVisitor,
) -> Result<Collection<'a>, FhirPathError> {
    #[cfg(feature = "trace")]
    debug!("Evaluating expression: {}", expression);

    // Parse before touching the tree
    let parsed = parse_str(expression, schema)?;

    #[cfg(feature = "trace")]
    trace!("Parsed into {} step(s)", parsed.len());

    let result = evaluate_parsed(root, &parsed, visitor);

    #[cfg(feature = "trace")]
    match &result {
        Ok(value) => debug!("Expression evaluation result: {}", value),
        Err(err) => debug!("Expression evaluation error: {}", err),
    }

    result
}
