use std::collections::{BTreeMap, BTreeSet};

use provenance_graph::{Graph, Identifier};
use serde::{Deserialize, Serialize};

use crate::{PolicyError, Rule, Scope};

/// A [`PolicyRuleSet`] maps every action to the ordered list of [`Rule`]s
/// that decide it. Order matters: the first rule that fires decides.
///
/// Rule sets are plain data. They read from JSON documents keyed by action:
///
/// ```json
/// {
///   "export": [
///     { "effect": "deny", "when": { "lineage": { "from": "target", "via": { "transitive": "derivedFrom" }, "to": { "node": "restrictedSource" } } } },
///     { "effect": "allow", "when": "always" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyRuleSet {
    actions: BTreeMap<Identifier, Vec<Rule>>,
}

impl PolicyRuleSet {
    /// Parse a rule set from its JSON document and check that every rule is
    /// well formed
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let rules: PolicyRuleSet = serde_json::from_str(document)?;
        rules.validate(None)?;
        Ok(rules)
    }

    /// Builder-style [`PolicyRuleSet::insert`]
    pub fn with(mut self, action: Identifier, rules: Vec<Rule>) -> Self {
        self.insert(action, rules);
        self
    }

    /// Register the rules for `action`, replacing any it already had
    pub fn insert(&mut self, action: Identifier, rules: Vec<Rule>) -> Option<Vec<Rule>> {
        self.actions.insert(action, rules)
    }

    /// The rules registered for `action`, if any
    pub fn rules(&self, action: &str) -> Option<&[Rule]> {
        self.actions.get(action).map(Vec::as_slice)
    }

    /// The rules registered for `action`, or [`PolicyError::UnknownAction`]
    pub fn require(&self, action: &Identifier) -> Result<&[Rule], PolicyError> {
        self.rules(action).ok_or_else(|| PolicyError::UnknownAction {
            action: action.clone(),
        })
    }

    /// Every action that has rules, in order
    pub fn actions(&self) -> impl Iterator<Item = &Identifier> {
        self.actions.keys()
    }

    /// The number of actions that have rules
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when no action has rules
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check every rule for structural defects and, given a [`Vocabulary`],
    /// for references to attributes or predicates it does not know. The
    /// first defect found is reported.
    pub fn validate(&self, vocabulary: Option<&Vocabulary>) -> Result<(), PolicyError> {
        for (action, rules) in &self.actions {
            for (position, rule) in rules.iter().enumerate() {
                rule.when
                    .validate(vocabulary)
                    .map_err(|defect| PolicyError::MalformedRule {
                        action: action.clone(),
                        position,
                        defect,
                    })?;
            }
        }
        Ok(())
    }
}

/// The names a rule set may refer to. Each half is optional: a vocabulary
/// that lists no attributes does not restrict attribute keys at all, and
/// likewise for predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<BTreeMap<Scope, BTreeSet<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    predicates: Option<BTreeSet<Identifier>>,
}

impl Vocabulary {
    /// Declare an attribute key
    pub fn attribute(mut self, scope: Scope, key: impl Into<String>) -> Self {
        self.attributes
            .get_or_insert_with(BTreeMap::new)
            .entry(scope)
            .or_default()
            .insert(key.into());
        self
    }

    /// Declare a predicate
    pub fn predicate(mut self, predicate: Identifier) -> Self {
        self.predicates
            .get_or_insert_with(BTreeSet::new)
            .insert(predicate);
        self
    }

    /// Declare every predicate that currently labels an edge of `graph`
    pub fn predicates_of(mut self, graph: &Graph) -> Self {
        self.predicates
            .get_or_insert_with(BTreeSet::new)
            .extend(graph.predicates().cloned());
        self
    }

    /// Whether rules may refer to the attribute
    pub fn knows_attribute(&self, scope: Scope, key: &str) -> bool {
        self.attributes.as_ref().is_none_or(|attributes| {
            attributes
                .get(&scope)
                .is_some_and(|keys| keys.contains(key))
        })
    }

    /// Whether rules may refer to the predicate
    pub fn knows_predicate(&self, predicate: &str) -> bool {
        self.predicates
            .as_ref()
            .is_none_or(|predicates| predicates.contains(predicate))
    }
}
