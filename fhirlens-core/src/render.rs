// fhirlens Rendering
//
// Display strings and JSON output for result collections.
//
// String-like primitives print bare, other primitives print `TypeName[value]`,
// bound codes print `Enumeration[code]`.

use crate::model::{Collection, Composite, FieldValue, Node, Primitive, PrimitiveType, PrimitiveValue};
use crate::schema::capitalize;
use serde_json::{Map, Number, Value};
use std::fmt;

impl PrimitiveType {
    /// Whether the display form is the bare value
    pub fn renders_bare(&self) -> bool {
        matches!(
            self,
            PrimitiveType::String | PrimitiveType::Markdown | PrimitiveType::Code | PrimitiveType::Id
        )
    }

    /// Display class name, e.g. `IntegerType`
    pub fn display_name(&self) -> String {
        format!("{}Type", capitalize(self.fhir_name()))
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty.renders_bare() {
            write!(f, "{}", self.text())
        } else {
            write!(f, "{}[{}]", self.ty.display_name(), self.text())
        }
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .get("id")
            .and_then(|value| value.iter().next())
            .and_then(Node::as_primitive);
        match id {
            Some(id) if self.resource => write!(f, "{}[{}]", self.type_name, id.text()),
            _ => write!(f, "{}", self.type_name),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Primitive(primitive) => fmt::Display::fmt(primitive, f),
            Node::Enumeration(code) => write!(f, "Enumeration[{}]", code),
            Node::Composite(composite) => fmt::Display::fmt(composite, f),
        }
    }
}

impl fmt::Display for Collection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, node) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", node)?;
        }
        write!(f, "]")
    }
}

impl Node {
    /// Converts the node to FHIR-shaped JSON
    pub fn to_json(&self) -> Value {
        match self {
            Node::Primitive(primitive) => primitive_to_json(primitive),
            Node::Enumeration(code) => Value::String(code.clone()),
            Node::Composite(composite) => {
                let mut map = Map::new();
                if composite.resource {
                    map.insert(
                        "resourceType".to_string(),
                        Value::String(composite.type_name.clone()),
                    );
                }
                for field in &composite.fields {
                    let value = match &field.value {
                        FieldValue::Single(node) => node.to_json(),
                        FieldValue::Sequence(nodes) => {
                            Value::Array(nodes.iter().map(Node::to_json).collect())
                        }
                    };
                    map.insert(field.name.clone(), value);
                }
                Value::Object(map)
            }
        }
    }
}

impl Collection<'_> {
    /// Converts the collection to a JSON array
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(Node::to_json).collect())
    }
}

fn primitive_to_json(primitive: &Primitive) -> Value {
    match &primitive.value {
        PrimitiveValue::Boolean(b) => Value::Bool(*b),
        PrimitiveValue::Integer(i) => Value::Number(Number::from(*i)),
        PrimitiveValue::Decimal(d) => d
            .to_string()
            .parse::<Number>()
            .map_or(Value::Null, Value::Number),
        PrimitiveValue::Text(s) => Value::String(s.clone()),
    }
}
