use provenance_graph::Identifier;
use serde::{Deserialize, Serialize};

use crate::{AttributeValue, Attributes};

/// A question put to the decision point: may `subject` perform `action` on
/// `target`? The subject is assumed to be authenticated already.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Who is asking
    pub subject: Identifier,
    /// What they want to do
    pub action: Identifier,
    /// What they want to do it to
    pub target: Identifier,
    /// Per-request facts that rules may consult
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub context: Attributes,
}

impl DecisionRequest {
    /// A request with an empty context
    pub fn new(subject: Identifier, action: Identifier, target: Identifier) -> Self {
        DecisionRequest {
            subject,
            action,
            target,
            context: Attributes::default(),
        }
    }

    /// Add a context entry to this request
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.context.insert(key, value);
        self
    }
}
