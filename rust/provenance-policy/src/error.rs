//! Error types for rule validation and evaluation

use std::{fmt::Display, time::Duration};

use provenance_graph::{Identifier, ProvenanceGraphError};
use thiserror::Error;

use crate::Scope;

/// Errors that can occur while loading or evaluating policy rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// No rules are registered for the requested action
    #[error("No policy registered for action \"{action}\"")]
    UnknownAction {
        /// The action that was requested
        action: Identifier,
    },

    /// A lineage traversal ran past the decision deadline
    #[error("Rule {position} of action \"{action}\" exceeded the decision deadline after {elapsed:?}")]
    EvaluationTimeout {
        /// The action being decided
        action: Identifier,
        /// Zero-based position of the rule in the action's list
        position: usize,
        /// Time spent on the decision when it gave up
        elapsed: Duration,
    },

    /// A rule is structurally invalid or refers to unknown names
    #[error("Rule {position} of action \"{action}\" is malformed: {defect}")]
    MalformedRule {
        /// The action the rule belongs to
        action: Identifier,
        /// Zero-based position of the rule in the action's list
        position: usize,
        /// What is wrong with it
        defect: RuleDefect,
    },

    /// A rule set document could not be read
    #[error("Malformed rule set document: {0}")]
    MalformedDocument(String),

    /// The provenance graph failed while a rule was being evaluated
    #[error("Rule {position} of action \"{action}\" failed: {source}")]
    Graph {
        /// The action being decided
        action: Identifier,
        /// Zero-based position of the rule in the action's list
        position: usize,
        /// The underlying graph failure
        source: ProvenanceGraphError,
    },

    /// Evaluation did not complete for a reason outside the rules
    #[error("Evaluation aborted: {0}")]
    Internal(String),
}

/// What makes a rule malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDefect {
    /// An attribute check names a key the vocabulary does not know
    UnknownAttribute {
        /// Where the attribute is looked up
        scope: Scope,
        /// The attribute key
        key: String,
    },
    /// A lineage check names a predicate the vocabulary does not know
    UnknownPredicate {
        /// The predicate identifier
        predicate: Identifier,
    },
    /// An attribute check has an empty key
    EmptyAttributeKey,
    /// A `one_of` comparison lists no values
    EmptyChoices,
    /// A lineage check over a predicate set names no predicates
    EmptyPredicateSet,
    /// A lineage check over a predicate sequence names no predicates
    EmptySequence,
    /// An endpoint reads an empty context key
    EmptyContextKey,
    /// An `all` or `any` combinator has no operands
    EmptyCombinator,
}

impl Display for RuleDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleDefect::UnknownAttribute { scope, key } => {
                write!(f, "unknown {scope} attribute \"{key}\"")
            }
            RuleDefect::UnknownPredicate { predicate } => {
                write!(f, "unknown predicate \"{predicate}\"")
            }
            RuleDefect::EmptyAttributeKey => write!(f, "attribute key is empty"),
            RuleDefect::EmptyChoices => write!(f, "one_of lists no values"),
            RuleDefect::EmptyPredicateSet => write!(f, "predicate set is empty"),
            RuleDefect::EmptySequence => write!(f, "predicate sequence is empty"),
            RuleDefect::EmptyContextKey => write!(f, "context endpoint key is empty"),
            RuleDefect::EmptyCombinator => write!(f, "combinator has no conditions"),
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(value: serde_json::Error) -> Self {
        PolicyError::MalformedDocument(format!("{value}"))
    }
}
