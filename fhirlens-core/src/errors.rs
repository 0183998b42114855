// fhirlens Error Types
//
// This module defines the error type shared by the loader, parser and evaluator.

use thiserror::Error;

/// Errors that can occur while loading resources, parsing expressions or evaluating them
#[derive(Error, Debug)]
pub enum FhirPathError {
    /// Malformed expression: bad token, unbalanced parentheses, unknown function,
    /// unsupported predicate operator
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    /// A predicate target is structurally incompatible with equality
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// The resource document does not fit the schema
    #[error("Load error: {0}")]
    LoadError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FhirPathError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        FhirPathError::SyntaxError(message.into())
    }

    pub(crate) fn load(message: impl Into<String>) -> Self {
        FhirPathError::LoadError(message.into())
    }

    /// Returns true for errors raised before the expression touched any resource
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, FhirPathError::SyntaxError(_))
    }
}
