// fhirlens Schema
//
// Field tables for resources and datatypes. The loader uses them to type JSON
// values and to order fields; the parser uses them to recognise resource type
// names. Definitions can be extended at load time from JSON.

use crate::errors::FhirPathError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Whether a type is a top-level resource or a datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Resource,
    Datatype,
}

/// Maximum cardinality of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cardinality {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "*")]
    Many,
}

/// One named element of a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Element name without the `[x]` suffix for choice elements
    pub name: String,

    /// Allowed type names; more than one makes this a choice element
    pub types: Vec<String>,

    #[serde(default)]
    pub max: Cardinality,

    /// Code elements bound to a required value set load as enumerations
    #[serde(default)]
    pub binding_required: bool,
}

impl ElementDefinition {
    pub fn is_choice(&self) -> bool {
        self.types.len() > 1
    }

    pub fn is_repeating(&self) -> bool {
        self.max == Cardinality::Many
    }

    /// Matches a JSON property name against this element.
    ///
    /// Returns the concrete type the property carries.
    pub fn match_json_key(&self, key: &str) -> Option<&str> {
        if !self.is_choice() {
            return (key == self.name).then(|| self.types[0].as_str());
        }
        let suffix = key.strip_prefix(self.name.as_str())?;
        self.types
            .iter()
            .find(|ty| capitalize(ty) == suffix)
            .map(String::as_str)
    }
}

/// Element table of a single resource or datatype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub elements: Vec<ElementDefinition>,
}

impl TypeDefinition {
    /// Finds the element a JSON property belongs to, with its concrete type
    pub fn resolve_json_key(&self, key: &str) -> Option<(usize, &ElementDefinition, &str)> {
        self.elements.iter().enumerate().find_map(|(idx, element)| {
            element
                .match_json_key(key)
                .map(|ty| (idx, element, ty))
        })
    }

    pub fn element(&self, name: &str) -> Option<&ElementDefinition> {
        self.elements.iter().find(|element| element.name == name)
    }
}

/// Table of known resource and datatype definitions
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, TypeDefinition>,
}

impl Schema {
    /// Creates an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the bundled R4 definitions for Patient and the datatypes it uses
    pub fn r4() -> Self {
        let mut schema = Self::new();
        for definition in r4_definitions() {
            schema.insert(definition);
        }
        schema
    }

    /// Shared instance of the bundled R4 schema
    pub fn builtin() -> &'static Schema {
        static BUILTIN: OnceLock<Schema> = OnceLock::new();
        BUILTIN.get_or_init(Schema::r4)
    }

    /// Parses a JSON array of type definitions into a new schema
    pub fn from_json(json: &str) -> Result<Self, FhirPathError> {
        let mut schema = Self::new();
        schema.extend_from_json(json)?;
        Ok(schema)
    }

    /// Merges a JSON array of type definitions, replacing same-named types
    pub fn extend_from_json(&mut self, json: &str) -> Result<(), FhirPathError> {
        let definitions: Vec<TypeDefinition> = serde_json::from_str(json)?;
        for definition in definitions {
            validate_definition(&definition)?;
            self.insert(definition);
        }
        Ok(())
    }

    pub fn insert(&mut self, definition: TypeDefinition) {
        self.types.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn is_resource_type(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|definition| definition.kind == TypeKind::Resource)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_definition(definition: &TypeDefinition) -> Result<(), FhirPathError> {
    for element in &definition.elements {
        if element.types.is_empty() {
            return Err(FhirPathError::load(format!(
                "Element '{}.{}' declares no type",
                definition.name, element.name
            )));
        }
    }
    Ok(())
}

/// Upper-cases the first character, as used in choice element JSON names
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn element(name: &str, ty: &str, max: Cardinality) -> ElementDefinition {
    ElementDefinition {
        name: name.to_string(),
        types: vec![ty.to_string()],
        max,
        binding_required: false,
    }
}

fn one(name: &str, ty: &str) -> ElementDefinition {
    element(name, ty, Cardinality::One)
}

fn many(name: &str, ty: &str) -> ElementDefinition {
    element(name, ty, Cardinality::Many)
}

fn bound(name: &str) -> ElementDefinition {
    ElementDefinition {
        binding_required: true,
        ..one(name, "code")
    }
}

fn choice(name: &str, types: &[&str]) -> ElementDefinition {
    ElementDefinition {
        name: name.to_string(),
        types: types.iter().map(|ty| ty.to_string()).collect(),
        max: Cardinality::One,
        binding_required: false,
    }
}

fn datatype(name: &str, elements: Vec<ElementDefinition>) -> TypeDefinition {
    let mut all = vec![one("id", "string"), many("extension", "Extension")];
    all.extend(elements);
    TypeDefinition {
        name: name.to_string(),
        kind: TypeKind::Datatype,
        elements: all,
    }
}

fn backbone(name: &str, elements: Vec<ElementDefinition>) -> TypeDefinition {
    let mut definition = datatype(name, vec![many("modifierExtension", "Extension")]);
    definition.elements.extend(elements);
    definition
}

fn r4_definitions() -> Vec<TypeDefinition> {
    vec![
        TypeDefinition {
            name: "Patient".to_string(),
            kind: TypeKind::Resource,
            elements: vec![
                one("id", "id"),
                one("meta", "Meta"),
                one("implicitRules", "uri"),
                one("language", "code"),
                one("text", "Narrative"),
                many("extension", "Extension"),
                many("modifierExtension", "Extension"),
                many("identifier", "Identifier"),
                one("active", "boolean"),
                many("name", "HumanName"),
                many("telecom", "ContactPoint"),
                bound("gender"),
                one("birthDate", "date"),
                choice("deceased", &["boolean", "dateTime"]),
                many("address", "Address"),
                one("maritalStatus", "CodeableConcept"),
                choice("multipleBirth", &["boolean", "integer"]),
                many("photo", "Attachment"),
                many("contact", "PatientContact"),
                many("communication", "PatientCommunication"),
                many("generalPractitioner", "Reference"),
                one("managingOrganization", "Reference"),
                many("link", "PatientLink"),
            ],
        },
        backbone(
            "PatientContact",
            vec![
                many("relationship", "CodeableConcept"),
                one("name", "HumanName"),
                many("telecom", "ContactPoint"),
                one("address", "Address"),
                bound("gender"),
                one("organization", "Reference"),
                one("period", "Period"),
            ],
        ),
        backbone(
            "PatientCommunication",
            vec![
                one("language", "CodeableConcept"),
                one("preferred", "boolean"),
            ],
        ),
        backbone(
            "PatientLink",
            vec![one("other", "Reference"), bound("type")],
        ),
        datatype(
            "HumanName",
            vec![
                bound("use"),
                one("text", "string"),
                one("family", "string"),
                many("given", "string"),
                many("prefix", "string"),
                many("suffix", "string"),
                one("period", "Period"),
            ],
        ),
        datatype(
            "Address",
            vec![
                bound("use"),
                bound("type"),
                one("text", "string"),
                many("line", "string"),
                one("city", "string"),
                one("district", "string"),
                one("state", "string"),
                one("postalCode", "string"),
                one("country", "string"),
                one("period", "Period"),
            ],
        ),
        datatype(
            "ContactPoint",
            vec![
                bound("system"),
                one("value", "string"),
                bound("use"),
                one("rank", "positiveInt"),
                one("period", "Period"),
            ],
        ),
        datatype(
            "Identifier",
            vec![
                bound("use"),
                one("type", "CodeableConcept"),
                one("system", "uri"),
                one("value", "string"),
                one("period", "Period"),
                one("assigner", "Reference"),
            ],
        ),
        datatype(
            "Period",
            vec![one("start", "dateTime"), one("end", "dateTime")],
        ),
        datatype(
            "Reference",
            vec![
                one("reference", "string"),
                one("type", "uri"),
                one("identifier", "Identifier"),
                one("display", "string"),
            ],
        ),
        datatype(
            "CodeableConcept",
            vec![many("coding", "Coding"), one("text", "string")],
        ),
        datatype(
            "Coding",
            vec![
                one("system", "uri"),
                one("version", "string"),
                one("code", "code"),
                one("display", "string"),
                one("userSelected", "boolean"),
            ],
        ),
        datatype(
            "Extension",
            vec![
                one("url", "uri"),
                choice(
                    "value",
                    &[
                        "string",
                        "boolean",
                        "integer",
                        "decimal",
                        "code",
                        "uri",
                        "date",
                        "dateTime",
                        "CodeableConcept",
                        "Coding",
                        "Reference",
                        "Period",
                        "Identifier",
                        "HumanName",
                        "Address",
                    ],
                ),
            ],
        ),
        datatype(
            "Meta",
            vec![
                one("versionId", "id"),
                one("lastUpdated", "instant"),
                one("source", "uri"),
                many("profile", "canonical"),
                many("security", "Coding"),
                many("tag", "Coding"),
            ],
        ),
        datatype(
            "Narrative",
            vec![bound("status"), one("div", "string")],
        ),
        datatype(
            "Attachment",
            vec![
                one("contentType", "code"),
                one("language", "code"),
                one("data", "base64Binary"),
                one("url", "url"),
                one("size", "unsignedInt"),
                one("hash", "base64Binary"),
                one("title", "string"),
                one("creation", "dateTime"),
            ],
        ),
    ]
}
