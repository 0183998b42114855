// fhirlens Function Registry
//
// Maps function names to their argument signature and evaluation semantics.

use crate::errors::FhirPathError;
use crate::evaluator::navigate;
use crate::model::{Collection, Node, PrimitiveValue};
use crate::parser::{Argument, Literal, Predicate};

/// Built-in collection functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Count,
    Children,
    Descendants,
    Where,
    Exists,
    Empty,
    First,
    Last,
}

/// Shape of the argument a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// `name()`
    None,
    /// `name(path = literal)`
    Predicate,
}

/// Registry entry
#[derive(Debug)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub function: Function,
    pub argument: ArgumentKind,
}

static REGISTRY: &[FunctionSignature] = &[
    FunctionSignature {
        name: "count",
        function: Function::Count,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "children",
        function: Function::Children,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "descendants",
        function: Function::Descendants,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "where",
        function: Function::Where,
        argument: ArgumentKind::Predicate,
    },
    FunctionSignature {
        name: "exists",
        function: Function::Exists,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "empty",
        function: Function::Empty,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "first",
        function: Function::First,
        argument: ArgumentKind::None,
    },
    FunctionSignature {
        name: "last",
        function: Function::Last,
        argument: ArgumentKind::None,
    },
];

/// Looks up a function by name
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    REGISTRY.iter().find(|signature| signature.name == name)
}

/// Names of all registered functions
pub fn function_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|signature| signature.name)
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Count => "count",
            Function::Children => "children",
            Function::Descendants => "descendants",
            Function::Where => "where",
            Function::Exists => "exists",
            Function::Empty => "empty",
            Function::First => "first",
            Function::Last => "last",
        }
    }

    /// Applies the function to an input collection
    pub fn apply<'a>(
        &self,
        input: Collection<'a>,
        argument: &Argument,
    ) -> Result<Collection<'a>, FhirPathError> {
        match (self, argument) {
            (Function::Where, Argument::Predicate(predicate)) => filter_where(input, predicate),
            (Function::Where, Argument::None) => Err(FhirPathError::EvaluationError(
                "'where' function expects a predicate argument".to_string(),
            )),
            (_, Argument::Predicate(_)) => Err(FhirPathError::EvaluationError(format!(
                "'{}' function expects 0 arguments",
                self.name()
            ))),
            (Function::Count, Argument::None) => {
                Ok(Collection::single(Node::integer(input.len() as i64)))
            }
            (Function::Children, Argument::None) => Ok(children(&input)),
            (Function::Descendants, Argument::None) => Ok(descendants(&input)),
            (Function::Exists, Argument::None) => {
                Ok(Collection::single(Node::boolean(!input.is_empty())))
            }
            (Function::Empty, Argument::None) => {
                Ok(Collection::single(Node::boolean(input.is_empty())))
            }
            (Function::First, Argument::None) => Ok(input.into_iter().take(1).collect()),
            (Function::Last, Argument::None) => Ok(input.into_iter().next_back().into_iter().collect()),
        }
    }
}

/// Every child of every composite input, in node-then-field order
fn children<'a>(input: &Collection<'a>) -> Collection<'a> {
    input.expand(|node| match node {
        Node::Composite(composite) => composite.children().collect(),
        _ => Vec::new(),
    })
}

/// Depth-first, pre-order walk below every input node
fn descendants<'a>(input: &Collection<'a>) -> Collection<'a> {
    fn walk<'n>(node: &'n Node, out: &mut Vec<&'n Node>) {
        if let Node::Composite(composite) = node {
            for child in composite.children() {
                out.push(child);
                walk(child, out);
            }
        }
    }

    input.expand(|node| {
        let mut out = Vec::new();
        walk(node, &mut out);
        out
    })
}

/// Keeps nodes whose predicate path resolves to a single value equal to the literal
fn filter_where<'a>(
    input: Collection<'a>,
    predicate: &Predicate,
) -> Result<Collection<'a>, FhirPathError> {
    let mut kept = Vec::new();
    for node in input {
        if matches_predicate(&node, predicate)? {
            kept.push(node);
        }
    }
    Ok(kept.into_iter().collect())
}

fn matches_predicate(node: &Node, predicate: &Predicate) -> Result<bool, FhirPathError> {
    let mut resolved = Collection::from_ref(node);
    for name in &predicate.path {
        resolved = navigate(&resolved, name);
    }

    let target = match (resolved.first(), resolved.len()) {
        (None, _) => return Ok(false),
        (Some(single), 1) => single,
        (Some(_), many) => {
            return Err(FhirPathError::EvaluationError(format!(
                "Predicate path '{}' resolved to {} values; equality needs a single value",
                predicate.path.join("."),
                many
            )))
        }
    };

    match target {
        Node::Composite(composite) => Err(FhirPathError::EvaluationError(format!(
            "Predicate path '{}' resolved to a {} element, not a primitive",
            predicate.path.join("."),
            composite.type_name
        ))),
        Node::Enumeration(code) => Ok(*code == predicate.literal.text()),
        Node::Primitive(primitive) => {
            let literal = &predicate.literal;
            Ok(match (&primitive.value, literal) {
                (PrimitiveValue::Integer(a), Literal::Integer(b)) => a == b,
                (PrimitiveValue::Boolean(a), Literal::Boolean(b)) => a == b,
                // Scale is ignored: 2 = 2.0 = 2.00
                _ => match (primitive.as_decimal(), literal.as_decimal()) {
                    (Some(a), Some(b)) => a == b,
                    _ => primitive.text() == literal.text(),
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Composite, Primitive, PrimitiveType};
    use rust_decimal::Decimal;

    fn name(use_code: &str, given: &[&str]) -> Node {
        Composite::new("HumanName")
            .with_field("use", Node::enumeration(use_code))
            .with_sequence("given", given.iter().map(|g| Node::string(*g)).collect())
            .into()
    }

    fn predicate(path: &[&str], literal: Literal) -> Argument {
        Argument::Predicate(Predicate {
            path: path.iter().map(|s| s.to_string()).collect(),
            literal,
        })
    }

    #[test]
    fn every_variant_is_registered() {
        for function in [
            Function::Count,
            Function::Children,
            Function::Descendants,
            Function::Where,
            Function::Exists,
            Function::Empty,
            Function::First,
            Function::Last,
        ] {
            assert_eq!(lookup(function.name()).unwrap().function, function);
        }
        assert!(lookup("select").is_none());
    }

    #[test]
    fn where_on_ambiguous_path_is_an_error() {
        let input = Collection::single(name("official", &["Peter", "James"]));
        let err = Function::Where
            .apply(input, &predicate(&["given"], Literal::String("Peter".into())))
            .unwrap_err();
        assert!(matches!(err, FhirPathError::EvaluationError(_)));
    }

    #[test]
    fn where_on_composite_target_is_an_error() {
        let patient: Node = Composite::resource("Patient")
            .with_field("managingOrganization", Composite::new("Reference"))
            .into();
        let err = Function::Where
            .apply(
                Collection::single(patient),
                &predicate(&["managingOrganization"], Literal::String("x".into())),
            )
            .unwrap_err();
        assert!(matches!(err, FhirPathError::EvaluationError(_)));
    }

    #[test]
    fn argument_shape_mismatch_is_rejected() {
        let err = Function::Count
            .apply(
                Collection::empty(),
                &predicate(&["use"], Literal::Boolean(true)),
            )
            .unwrap_err();
        assert!(matches!(err, FhirPathError::EvaluationError(_)));
    }

    #[test]
    fn literal_coercion_rules() {
        let telecom: Node = Composite::new("ContactPoint")
            .with_field("rank", Node::integer(2))
            .with_field("active", Node::boolean(true))
            .into();
        let keeps = |path: &str, literal: Literal| {
            let result = Function::Where
                .apply(
                    Collection::single(telecom.clone()),
                    &predicate(&[path], literal),
                )
                .unwrap();
            !result.is_empty()
        };

        assert!(keeps("rank", Literal::Integer(2)));
        assert!(keeps("rank", Literal::Decimal(Decimal::new(20, 1))));
        assert!(!keeps("rank", Literal::Decimal(Decimal::new(21, 1))));
        assert!(keeps("rank", Literal::String("2".into())));
        assert!(!keeps("rank", Literal::Integer(3)));
        assert!(keeps("active", Literal::Boolean(true)));
        assert!(keeps("active", Literal::String("true".into())));
        assert!(!keeps("active", Literal::Boolean(false)));
    }

    #[test]
    fn descendants_walk_pre_order() {
        let input = Collection::single(name("usual", &["Jim"]));
        let result = Function::Descendants.apply(input, &Argument::None).unwrap();
        assert_eq!(
            result.into_vec(),
            vec![Node::enumeration("usual"), Node::string("Jim")]
        );
    }

    #[test]
    fn decimal_literal_against_string_uses_written_form() {
        let component: Node = Composite::new("Component")
            .with_field("code", Node::string("2.0"))
            .with_field(
                "value",
                Primitive::new(
                    PrimitiveType::Decimal,
                    PrimitiveValue::Decimal(Decimal::new(150, 2)),
                ),
            )
            .into();
        let keeps = |path: &str, literal: Literal| {
            !Function::Where
                .apply(
                    Collection::from_ref(&component),
                    &predicate(&[path], literal),
                )
                .unwrap()
                .is_empty()
        };

        assert!(keeps("code", Literal::Decimal(Decimal::new(20, 1))));
        assert!(!keeps("code", Literal::Integer(2)));
        assert!(keeps("value", Literal::Decimal(Decimal::new(15, 1))));
        assert!(keeps("value", Literal::String("1.50".into())));
        assert!(!keeps("value", Literal::String("1.5".into())));
    }

    #[test]
    fn integer_and_decimal_compare_exactly_beyond_float_precision() {
        let telecom: Node = Composite::new("ContactPoint")
            .with_field("rank", Node::integer(9_007_199_254_740_993))
            .into();
        let keeps = |literal: Literal| {
            !Function::Where
                .apply(
                    Collection::from_ref(&telecom),
                    &predicate(&["rank"], literal),
                )
                .unwrap()
                .is_empty()
        };

        assert!(!keeps(Literal::Decimal(Decimal::new(90_071_992_547_409_920, 1))));
        assert!(keeps(Literal::Decimal(Decimal::new(90_071_992_547_409_930, 1))));
        assert!(!keeps(Literal::Integer(9_007_199_254_740_992)));
    }

    #[test]
    fn results_borrow_from_the_input_tree() {
        let resource = name("official", &["Peter", "James"]);
        let result = Function::Children
            .apply(Collection::from_ref(&resource), &Argument::None)
            .unwrap();
        let given = resource
            .as_composite()
            .and_then(|c| c.get("given"))
            .and_then(|value| value.iter().next())
            .unwrap();
        assert!(result.iter().any(|node| std::ptr::eq(node, given)));
    }
}
