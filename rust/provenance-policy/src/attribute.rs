use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use provenance_graph::Identifier;
use serde::{Deserialize, Serialize};

/// A single attribute value. Attribute values are deliberately simple:
/// policies compare them for equality and membership, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A boolean flag
    Boolean(bool),
    /// A whole number
    Integer(i64),
    /// Free text
    String(String),
}

impl AttributeValue {
    /// The value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Boolean(value) => write!(f, "{value}"),
            AttributeValue::Integer(value) => write!(f, "{value}"),
            AttributeValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// A mapping from attribute key to [`AttributeValue`]. Used for subject and
/// target attributes as well as for the context of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    /// Look up one attribute
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// Set one attribute, returning the previous value
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`Attributes::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// True when there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Where an attribute check looks for its attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Attributes of the requesting subject
    Subject,
    /// Attributes of the target resource
    Target,
    /// The per-request context
    Context,
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Subject => write!(f, "subject"),
            Scope::Target => write!(f, "target"),
            Scope::Context => write!(f, "context"),
        }
    }
}

/// Supplies the attributes of subjects and targets at decision time. The
/// subject is already authenticated by the caller; the resolver only
/// describes it.
pub trait AttributeResolver: Send + Sync {
    /// The attributes of a requesting subject
    fn subject_attributes(&self, subject: &Identifier) -> Attributes;

    /// The attributes of a target resource
    fn target_attributes(&self, target: &Identifier) -> Attributes;
}

/// An [`AttributeResolver`] that knows nothing about anyone. Every attribute
/// check on a subject or target abstains under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttributes;

impl AttributeResolver for NoAttributes {
    fn subject_attributes(&self, _subject: &Identifier) -> Attributes {
        Attributes::default()
    }

    fn target_attributes(&self, _target: &Identifier) -> Attributes {
        Attributes::default()
    }
}

/// An [`AttributeResolver`] backed by fixed tables, typically loaded from a
/// JSON document alongside the rule set:
///
/// ```json
/// {
///   "subjects": { "alice": { "clearance": "secret" } },
///   "targets": { "doc1": { "classification": "internal" } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticAttributes {
    #[serde(default)]
    subjects: HashMap<Identifier, Attributes>,
    #[serde(default)]
    targets: HashMap<Identifier, Attributes>,
}

impl StaticAttributes {
    /// Record the attributes of a subject
    pub fn subject(mut self, subject: Identifier, attributes: Attributes) -> Self {
        self.subjects.insert(subject, attributes);
        self
    }

    /// Record the attributes of a target
    pub fn target(mut self, target: Identifier, attributes: Attributes) -> Self {
        self.targets.insert(target, attributes);
        self
    }
}

impl AttributeResolver for StaticAttributes {
    fn subject_attributes(&self, subject: &Identifier) -> Attributes {
        self.subjects.get(subject).cloned().unwrap_or_default()
    }

    fn target_attributes(&self, target: &Identifier) -> Attributes {
        self.targets.get(target).cloned().unwrap_or_default()
    }
}
