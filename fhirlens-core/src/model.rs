// fhirlens Data Model
//
// This module defines the typed resource tree the evaluator navigates and the
// ordered collections that flow between evaluation steps.

use rust_decimal::Decimal;
use std::borrow::Cow;
use std::slice;

/// FHIR primitive datatypes understood by the loader and the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Integer,
    PositiveInt,
    UnsignedInt,
    Decimal,
    String,
    Markdown,
    Code,
    Id,
    Uri,
    Url,
    Canonical,
    Oid,
    Base64Binary,
    Date,
    DateTime,
    Instant,
    Time,
}

impl PrimitiveType {
    /// Looks up a primitive type by its FHIR name (e.g. "positiveInt")
    pub fn from_fhir_name(name: &str) -> Option<Self> {
        let ty = match name {
            "boolean" => PrimitiveType::Boolean,
            "integer" => PrimitiveType::Integer,
            "positiveInt" => PrimitiveType::PositiveInt,
            "unsignedInt" => PrimitiveType::UnsignedInt,
            "decimal" => PrimitiveType::Decimal,
            "string" => PrimitiveType::String,
            "markdown" => PrimitiveType::Markdown,
            "code" => PrimitiveType::Code,
            "id" => PrimitiveType::Id,
            "uri" => PrimitiveType::Uri,
            "url" => PrimitiveType::Url,
            "canonical" => PrimitiveType::Canonical,
            "oid" => PrimitiveType::Oid,
            "base64Binary" => PrimitiveType::Base64Binary,
            "date" => PrimitiveType::Date,
            "dateTime" => PrimitiveType::DateTime,
            "instant" => PrimitiveType::Instant,
            "time" => PrimitiveType::Time,
            _ => return None,
        };
        Some(ty)
    }

    /// The FHIR name of the type, as written in structure definitions
    pub fn fhir_name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::PositiveInt => "positiveInt",
            PrimitiveType::UnsignedInt => "unsignedInt",
            PrimitiveType::Decimal => "decimal",
            PrimitiveType::String => "string",
            PrimitiveType::Markdown => "markdown",
            PrimitiveType::Code => "code",
            PrimitiveType::Id => "id",
            PrimitiveType::Uri => "uri",
            PrimitiveType::Url => "url",
            PrimitiveType::Canonical => "canonical",
            PrimitiveType::Oid => "oid",
            PrimitiveType::Base64Binary => "base64Binary",
            PrimitiveType::Date => "date",
            PrimitiveType::DateTime => "dateTime",
            PrimitiveType::Instant => "instant",
            PrimitiveType::Time => "time",
        }
    }

    /// Whether values of this type are carried as JSON numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Integer
                | PrimitiveType::PositiveInt
                | PrimitiveType::UnsignedInt
                | PrimitiveType::Decimal
        )
    }
}

/// The value carried by a primitive node
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    /// Keeps the written scale: `1.50` stays `1.50`
    Decimal(Decimal),
    Text(String),
}

/// A typed primitive leaf of the resource tree
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub ty: PrimitiveType,
    pub value: PrimitiveValue,
}

impl Primitive {
    pub fn new(ty: PrimitiveType, value: PrimitiveValue) -> Self {
        Self { ty, value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(PrimitiveType::String, PrimitiveValue::Text(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::new(PrimitiveType::Integer, PrimitiveValue::Integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(PrimitiveType::Boolean, PrimitiveValue::Boolean(value))
    }

    /// Canonical text form, used for display and for coerced equality
    pub fn text(&self) -> String {
        match &self.value {
            PrimitiveValue::Boolean(b) => b.to_string(),
            PrimitiveValue::Integer(i) => i.to_string(),
            PrimitiveValue::Decimal(d) => d.to_string(),
            PrimitiveValue::Text(s) => s.clone(),
        }
    }

    /// Exact numeric view of the value, if it is a number
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.value {
            PrimitiveValue::Integer(i) => Some(Decimal::from(i)),
            PrimitiveValue::Decimal(d) => Some(d),
            _ => None,
        }
    }
}

/// One typed value in the resource tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Primitive leaf (string, integer, boolean, date, ...)
    Primitive(Primitive),

    /// Code bound to a required value set
    Enumeration(String),

    /// Datatype or resource with named fields
    Composite(Composite),
}

impl Node {
    pub fn string(value: impl Into<String>) -> Self {
        Node::Primitive(Primitive::string(value))
    }

    pub fn integer(value: i64) -> Self {
        Node::Primitive(Primitive::integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Node::Primitive(Primitive::boolean(value))
    }

    pub fn enumeration(code: impl Into<String>) -> Self {
        Node::Enumeration(code.into())
    }

    /// The declared type name of the node
    pub fn type_name(&self) -> &str {
        match self {
            Node::Primitive(p) => p.ty.fhir_name(),
            Node::Enumeration(_) => "code",
            Node::Composite(c) => &c.type_name,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Node::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Node::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// The resource type, if this node is a top-level resource
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Node::Composite(c) if c.resource => Some(&c.type_name),
            _ => None,
        }
    }
}

impl From<Composite> for Node {
    fn from(composite: Composite) -> Self {
        Node::Composite(composite)
    }
}

impl From<Primitive> for Node {
    fn from(primitive: Primitive) -> Self {
        Node::Primitive(primitive)
    }
}

/// Value of a composite's field: one node or an ordered sequence of nodes
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(Node),
    Sequence(Vec<Node>),
}

impl FieldValue {
    /// Iterates the field's nodes, one level deep, in document order
    pub fn iter(&self) -> slice::Iter<'_, Node> {
        match self {
            FieldValue::Single(node) => slice::from_ref(node).iter(),
            FieldValue::Sequence(nodes) => nodes.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldValue::Single(_) => 1,
            FieldValue::Sequence(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named field of a composite
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// A datatype or resource instance
///
/// Fields are kept in schema declaration order; `children()` relies on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub type_name: String,
    pub resource: bool,
    pub fields: Vec<Field>,
}

impl Composite {
    /// Creates an empty datatype instance
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            resource: false,
            fields: Vec::new(),
        }
    }

    /// Creates an empty resource instance
    pub fn resource(type_name: impl Into<String>) -> Self {
        Self {
            resource: true,
            ..Self::new(type_name)
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.push(name, FieldValue::Single(node.into()));
        self
    }

    pub fn with_sequence(mut self, name: impl Into<String>, nodes: Vec<Node>) -> Self {
        self.push(name, FieldValue::Sequence(nodes));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    /// Looks up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Iterates every child node of every field, in field order
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.fields.iter().flat_map(|field| field.value.iter())
    }
}

/// Ordered sequence of nodes; the unit of data flow between evaluation steps
///
/// Nodes reached by navigation borrow from the resource tree. Nodes computed
/// by functions (counts, booleans) are owned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection<'a>(Vec<Cow<'a, Node>>);

impl<'a> Collection<'a> {
    /// Collection of owned nodes
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes.into_iter().map(Cow::Owned).collect())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn single(node: Node) -> Self {
        Self(vec![Cow::Owned(node)])
    }

    /// One-element collection borrowing `node`
    pub fn from_ref(node: &'a Node) -> Self {
        Self(vec![Cow::Borrowed(node)])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Node> + ExactSizeIterator + '_ {
        self.0.iter().map(deref_node)
    }

    pub fn first(&self) -> Option<&Node> {
        self.0.first().map(deref_node)
    }

    /// Maps every node to nodes reachable from it, flattened in input order.
    ///
    /// Results stay borrowed from the tree where the input node is borrowed.
    pub fn expand<F>(&self, f: F) -> Collection<'a>
    where
        F: for<'n> Fn(&'n Node) -> Vec<&'n Node>,
    {
        let mut out = Vec::new();
        for node in &self.0 {
            match node {
                Cow::Borrowed(node) => out.extend(f(*node).into_iter().map(Cow::Borrowed)),
                Cow::Owned(node) => {
                    out.extend(f(node).into_iter().map(|child| Cow::Owned(child.clone())))
                }
            }
        }
        Collection(out)
    }

    /// Detaches the collection from the tree it borrows from
    pub fn into_owned(self) -> Collection<'static> {
        Collection(
            self.0
                .into_iter()
                .map(|node| Cow::Owned(node.into_owned()))
                .collect(),
        )
    }

    pub fn into_vec(self) -> Vec<Node> {
        self.0.into_iter().map(Cow::into_owned).collect()
    }
}

fn deref_node<'b>(node: &'b Cow<'_, Node>) -> &'b Node {
    node
}

impl<'a> FromIterator<Cow<'a, Node>> for Collection<'a> {
    fn from_iter<I: IntoIterator<Item = Cow<'a, Node>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for Collection<'a> {
    type Item = Cow<'a, Node>;
    type IntoIter = std::vec::IntoIter<Cow<'a, Node>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'b, 'a> IntoIterator for &'b Collection<'a> {
    type Item = &'b Node;
    type IntoIter = std::iter::Map<slice::Iter<'b, Cow<'a, Node>>, fn(&'b Cow<'a, Node>) -> &'b Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(deref_node as fn(&'b Cow<'a, Node>) -> &'b Node)
    }
}
