use std::fmt::Display;

use provenance_graph::Identifier;
use serde::{Serialize, Serializer};

use crate::{Effect, PolicyError};

/// Whether a request is permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The request is permitted
    Allow,
    /// The request is refused
    Deny,
}

impl From<Effect> for Outcome {
    fn from(value: Effect) -> Self {
        match value {
            Effect::Allow => Outcome::Allow,
            Effect::Deny => Outcome::Deny,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Allow => write!(f, "allow"),
            Outcome::Deny => write!(f, "deny"),
        }
    }
}

/// Why a [`Decision`] came out the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    /// A rule fired and its effect decided the request
    RuleMatched {
        /// The action being decided
        action: Identifier,
        /// Zero-based position of the rule in the action's list
        position: usize,
        /// The effect of the rule
        effect: Effect,
        /// The rule's description, if it has one
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// The lineage path that made the rule fire, if it checked lineage
        #[serde(skip_serializing_if = "Option::is_none")]
        witness: Option<Vec<Identifier>>,
    },
    /// No rules are registered for the action
    NoPolicy {
        /// The action being decided
        action: Identifier,
    },
    /// Every rule for the action abstained
    AllAbstained {
        /// The action being decided
        action: Identifier,
        /// How many rules were evaluated
        evaluated: usize,
    },
    /// A rule ran past the decision deadline
    EvaluationTimeout {
        /// The action being decided
        action: Identifier,
        /// Zero-based position of the rule that timed out
        position: usize,
    },
    /// Evaluation failed for a reason other than the deadline
    EvaluationFailed {
        /// The action being decided
        action: Identifier,
        /// Zero-based position of the failing rule, when one was running
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    /// The decision point had no capacity left to evaluate the request
    ServiceBusy,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::RuleMatched {
                action,
                position,
                effect,
                description,
                witness,
            } => {
                write!(f, "rule {position} for action \"{action}\" matched ({effect})")?;
                if let Some(description) = description {
                    write!(f, ": {description}")?;
                }
                if let Some(witness) = witness {
                    let path = witness
                        .iter()
                        .map(Identifier::as_str)
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    write!(f, " [lineage: {path}]")?;
                }
                Ok(())
            }
            Reason::NoPolicy { action } => write!(f, "no policy for action \"{action}\""),
            Reason::AllAbstained { action, evaluated } => write!(
                f,
                "all {evaluated} rules for action \"{action}\" abstained; denied by default"
            ),
            Reason::EvaluationTimeout { action, position } => write!(
                f,
                "rule {position} for action \"{action}\" exceeded the decision deadline; denied"
            ),
            Reason::EvaluationFailed { action, position } => match position {
                Some(position) => write!(
                    f,
                    "rule {position} for action \"{action}\" failed to evaluate; denied"
                ),
                None => write!(f, "evaluation of action \"{action}\" failed; denied"),
            },
            Reason::ServiceBusy => write!(f, "decision point is busy; denied"),
        }
    }
}

/// The answer to a [`crate::DecisionRequest`].
///
/// A decision that came about through a failure (a timeout, a broken graph,
/// an overloaded pool) is always a [`Outcome::Deny`] and carries the failure
/// in [`Decision::error`], so that callers and telemetry can tell it apart
/// from a deny the policy asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Allow or deny
    pub outcome: Outcome,
    /// Which rule, or which default, produced the outcome
    pub reason: Reason,
    /// The failure that forced a deny, if any
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<PolicyError>,
}

impl Decision {
    /// A decision with no attached error
    pub fn new(outcome: Outcome, reason: Reason) -> Self {
        Decision {
            outcome,
            reason,
            error: None,
        }
    }

    /// A deny forced by `error`
    pub fn failed(reason: Reason, error: PolicyError) -> Self {
        Decision {
            outcome: Outcome::Deny,
            reason,
            error: Some(error),
        }
    }

    /// The deny returned when there was no capacity to evaluate a request
    pub fn busy() -> Self {
        Decision::new(Outcome::Deny, Reason::ServiceBusy)
    }

    /// True when the request is permitted
    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allow
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.outcome, self.reason)?;
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

fn serialize_error<S>(error: &Option<PolicyError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.collect_str(error),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn it_explains_matched_rules_with_their_lineage() -> Result<()> {
        let reason = Reason::RuleMatched {
            action: "export".parse()?,
            position: 0,
            effect: Effect::Deny,
            description: Some("restricted lineage".into()),
            witness: Some(vec!["doc1".parse()?, "restrictedSource".parse()?]),
        };

        assert_eq!(
            reason.to_string(),
            "rule 0 for action \"export\" matched (deny): restricted lineage [lineage: doc1 -> restrictedSource]"
        );
        Ok(())
    }

    #[test]
    fn it_serializes_errors_as_strings() -> Result<()> {
        let action: Identifier = "export".parse()?;
        let decision = Decision::failed(
            Reason::EvaluationFailed {
                action: action.clone(),
                position: None,
            },
            PolicyError::Internal("worker panicked".into()),
        );

        assert_eq!(
            serde_json::to_value(&decision)?,
            json!({
                "outcome": "deny",
                "reason": { "kind": "evaluation_failed", "action": "export" },
                "error": "Evaluation aborted: worker panicked",
            })
        );
        assert_eq!(
            serde_json::to_value(Decision::new(Outcome::Deny, Reason::NoPolicy { action }))?,
            json!({
                "outcome": "deny",
                "reason": { "kind": "no_policy", "action": "export" },
            })
        );
        Ok(())
    }
}
