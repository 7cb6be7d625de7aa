use std::fmt::Display;

use provenance_graph::{Identifier, ProvenanceGraphError};
use serde::{Deserialize, Serialize};

use crate::{
    Condition,
    condition::{Environment, Truth},
};

/// What a rule does when its condition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Permit the request
    Allow,
    /// Refuse the request
    Deny,
}

impl Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// A single policy rule: an [`Effect`] that applies when a [`Condition`]
/// holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The effect of the rule when it fires
    pub effect: Effect,
    /// A human readable note carried into decision reasons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The condition under which the rule fires
    pub when: Condition,
}

impl Rule {
    /// A rule that allows when `when` holds
    pub fn allow(when: Condition) -> Self {
        Rule {
            effect: Effect::Allow,
            description: None,
            when,
        }
    }

    /// A rule that denies when `when` holds
    pub fn deny(when: Condition) -> Self {
        Rule {
            effect: Effect::Deny,
            description: None,
            when,
        }
    }

    /// Attach a description to this rule
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn apply(&self, environment: &Environment<'_>) -> Result<Verdict, ProvenanceGraphError> {
        Ok(match self.when.evaluate(environment)? {
            Truth::Holds { witness } => Verdict::Fires {
                effect: self.effect,
                witness,
            },
            Truth::Fails | Truth::Unknown => Verdict::Abstain,
        })
    }
}

/// The outcome of applying one rule to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Fires {
        effect: Effect,
        witness: Option<Vec<Identifier>>,
    },
    Abstain,
}
