mod instruction;
pub use instruction::*;

mod selector;
pub use selector::*;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Identifier, ProvenanceGraphError};

/// A [`Triple`] is a single provenance fact: `subject` is related to
/// `object` by `predicate`. Edges of the provenance graph run from subject
/// to object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// The node the statement is about
    pub subject: Identifier,
    /// The relationship being asserted
    pub predicate: Identifier,
    /// The node the subject is related to
    pub object: Identifier,
}

impl Triple {
    /// Assemble a [`Triple`] from already validated identifiers
    pub fn new(subject: Identifier, predicate: Identifier, object: Identifier) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Assemble a [`Triple`] from raw strings, validating each position
    pub fn parse(subject: &str, predicate: &str, object: &str) -> Result<Self, ProvenanceGraphError> {
        Ok(Self {
            subject: subject.parse()?,
            predicate: predicate.parse()?,
            object: object.parse()?,
        })
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> <{}> <{}> .", self.subject, self.predicate, self.object)
    }
}
