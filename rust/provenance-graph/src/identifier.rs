use std::{borrow::Borrow, fmt::Display, ops::Deref, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::ProvenanceGraphError;

/// An [`Identifier`] names a node or a predicate of the provenance graph.
/// Identifiers are opaque, non-empty strings (typically IRIs) that are
/// cheap to clone, so the same name may be shared by every index entry that
/// refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ProvenanceGraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::from_str(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ProvenanceGraphError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::from_str(value)
    }
}

impl FromStr for Identifier {
    type Err = ProvenanceGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ProvenanceGraphError::InvalidIdentifier(
                "Identifiers may not be empty".into(),
            ));
        }

        if s.chars().any(char::is_control) {
            return Err(ProvenanceGraphError::InvalidIdentifier(format!(
                "Identifier {s:?} contains control characters"
            )));
        }

        Ok(Self(Arc::from(s)))
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0.to_string()
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
