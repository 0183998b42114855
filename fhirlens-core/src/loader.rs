// fhirlens Resource Loader
//
// Builds the typed resource tree from a FHIR JSON document, driven by the
// schema's element tables.

use crate::errors::FhirPathError;
use crate::model::{Composite, Field, FieldValue, Node, Primitive, PrimitiveType, PrimitiveValue};
use crate::schema::{ElementDefinition, Schema, TypeDefinition, TypeKind};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::str::FromStr;

#[cfg(feature = "trace")]
use log::trace;

/// Loader configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Reject properties the schema does not declare instead of skipping them
    pub strict: bool,
}

/// Converts JSON documents into resource trees
pub struct Loader<'s> {
    schema: &'s Schema,
    options: LoaderOptions,
}

impl<'s> Loader<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            options: LoaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses and loads a JSON resource document
    pub fn load_str(&self, json: &str) -> Result<Node, FhirPathError> {
        let value: Value = serde_json::from_str(json)?;
        self.load(&value)
    }

    /// Loads a JSON resource into a typed tree
    pub fn load(&self, json: &Value) -> Result<Node, FhirPathError> {
        let obj = json
            .as_object()
            .ok_or_else(|| FhirPathError::load("Expected JSON object for FHIR resource"))?;

        let resource_type = match obj.get("resourceType") {
            Some(Value::String(rt)) => rt.as_str(),
            Some(_) => return Err(FhirPathError::load("'resourceType' must be a string")),
            None => return Err(FhirPathError::load("Missing 'resourceType'")),
        };

        let definition = self
            .schema
            .get(resource_type)
            .filter(|definition| definition.kind == TypeKind::Resource)
            .ok_or_else(|| {
                FhirPathError::load(format!("Unknown resource type '{}'", resource_type))
            })?;

        #[cfg(feature = "trace")]
        trace!("Loading {} resource", resource_type);

        let composite = self.load_composite(definition, obj, true, resource_type)?;
        Ok(Node::Composite(composite))
    }

    fn load_composite(
        &self,
        definition: &TypeDefinition,
        obj: &Map<String, Value>,
        resource: bool,
        path: &str,
    ) -> Result<Composite, FhirPathError> {
        let mut slots: Vec<(usize, Field)> = Vec::with_capacity(obj.len());

        for (key, value) in obj {
            // Primitive extension siblings (`_family`) carry no value
            if key.starts_with('_') || (resource && key == "resourceType") {
                continue;
            }

            let Some((index, element, ty)) = definition.resolve_json_key(key) else {
                if self.options.strict {
                    return Err(FhirPathError::load(format!(
                        "Unknown element '{}.{}'",
                        path, key
                    )));
                }
                log::warn!("Skipping unknown element '{}.{}'", path, key);
                continue;
            };

            if slots.iter().any(|(existing, _)| *existing == index) {
                return Err(FhirPathError::load(format!(
                    "Multiple values for element '{}.{}'",
                    path, element.name
                )));
            }

            let child_path = format!("{}.{}", path, element.name);
            if let Some(field_value) = self.load_field(element, ty, value, &child_path)? {
                slots.push((
                    index,
                    Field {
                        name: element.name.clone(),
                        value: field_value,
                    },
                ));
            }
        }

        // Schema declaration order, not JSON order
        slots.sort_by_key(|(index, _)| *index);

        Ok(Composite {
            type_name: definition.name.clone(),
            resource,
            fields: slots.into_iter().map(|(_, field)| field).collect(),
        })
    }

    fn load_field(
        &self,
        element: &ElementDefinition,
        ty: &str,
        value: &Value,
        path: &str,
    ) -> Result<Option<FieldValue>, FhirPathError> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) if element.is_repeating() => {
                let mut nodes = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let item_path = format!("{}[{}]", path, idx);
                    nodes.push(self.load_value(element, ty, item, &item_path)?);
                }
                if nodes.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(FieldValue::Sequence(nodes)))
                }
            }
            Value::Array(_) => Err(FhirPathError::load(format!(
                "Element '{}' does not repeat but holds an array",
                path
            ))),
            single if element.is_repeating() => Ok(Some(FieldValue::Sequence(vec![
                self.load_value(element, ty, single, path)?,
            ]))),
            single => Ok(Some(FieldValue::Single(
                self.load_value(element, ty, single, path)?,
            ))),
        }
    }

    fn load_value(
        &self,
        element: &ElementDefinition,
        ty: &str,
        value: &Value,
        path: &str,
    ) -> Result<Node, FhirPathError> {
        if let Some(primitive_type) = PrimitiveType::from_fhir_name(ty) {
            if primitive_type == PrimitiveType::Code && element.binding_required {
                return match value {
                    Value::String(code) => Ok(Node::Enumeration(code.clone())),
                    other => Err(type_mismatch(path, "code", other)),
                };
            }
            return load_primitive(primitive_type, value, path).map(Node::Primitive);
        }

        let definition = self.schema.get(ty).ok_or_else(|| {
            FhirPathError::load(format!("Element '{}' has unknown type '{}'", path, ty))
        })?;

        match value {
            Value::Object(obj) => Ok(Node::Composite(
                self.load_composite(definition, obj, false, path)?,
            )),
            other => Err(type_mismatch(path, ty, other)),
        }
    }
}

fn load_primitive(ty: PrimitiveType, value: &Value, path: &str) -> Result<Primitive, FhirPathError> {
    let primitive_value = match (ty, value) {
        (PrimitiveType::Boolean, Value::Bool(b)) => PrimitiveValue::Boolean(*b),
        (
            PrimitiveType::Integer | PrimitiveType::PositiveInt | PrimitiveType::UnsignedInt,
            Value::Number(n),
        ) => {
            let i = n
                .as_i64()
                .ok_or_else(|| type_mismatch(path, ty.fhir_name(), value))?;
            let in_range = match ty {
                PrimitiveType::PositiveInt => i > 0,
                PrimitiveType::UnsignedInt => i >= 0,
                _ => true,
            };
            if !in_range {
                return Err(FhirPathError::load(format!(
                    "Value {} at '{}' is out of range for {}",
                    i,
                    path,
                    ty.fhir_name()
                )));
            }
            PrimitiveValue::Integer(i)
        }
        (PrimitiveType::Decimal, Value::Number(n)) => PrimitiveValue::Decimal(
            parse_decimal(n).ok_or_else(|| type_mismatch(path, "decimal", value))?,
        ),
        (ty, Value::String(s)) if !ty.is_numeric() && ty != PrimitiveType::Boolean => {
            PrimitiveValue::Text(s.clone())
        }
        _ => return Err(type_mismatch(path, ty.fhir_name(), value)),
    };
    Ok(Primitive::new(ty, primitive_value))
}

/// Decimal with the scale written in the document (`1.50` keeps two places)
fn parse_decimal(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn type_mismatch(path: &str, expected: &str, found: &Value) -> FhirPathError {
    let kind = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    FhirPathError::load(format!(
        "Element '{}' expects {} but found JSON {}",
        path, expected, kind
    ))
}
