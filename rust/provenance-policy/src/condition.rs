use provenance_graph::{Identifier, Lineage, ProvenanceGraphError};
use serde::{Deserialize, Serialize};

use crate::{AttributeValue, Attributes, DecisionRequest, RuleDefect, Scope, Vocabulary};

/// How an [`AttributeCheck`] compares the attribute it finds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Comparison {
    /// The attribute equals `value`
    Equals {
        /// The expected value
        value: AttributeValue,
    },
    /// The attribute differs from `value`
    NotEquals {
        /// The value the attribute must not have
        value: AttributeValue,
    },
    /// The attribute is one of `values`
    OneOf {
        /// The accepted values
        values: Vec<AttributeValue>,
    },
    /// The attribute is set at all. Unlike the other comparisons this one
    /// never abstains: a missing attribute simply makes it false.
    Present,
}

/// An attribute predicate: a comparison against one attribute of the
/// subject, the target or the request context. If the attribute is missing
/// the check abstains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCheck {
    /// Where to look up the attribute
    pub scope: Scope,
    /// The attribute key
    pub key: String,
    /// How to compare it
    #[serde(flatten)]
    pub comparison: Comparison,
}

/// One end of a [`LineageCheck`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// The requesting subject
    Subject,
    /// The target of the request
    Target,
    /// A fixed node of the provenance graph
    Node(Identifier),
    /// The identifier stored under a key of the request context
    Context(String),
}

impl Endpoint {
    /// A fixed node, parsed from a string
    pub fn node(identifier: &str) -> Result<Self, ProvenanceGraphError> {
        Ok(Endpoint::Node(identifier.parse()?))
    }
}

/// Which edges a [`LineageCheck`] may follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Via {
    /// One or more edges, all labelled with this predicate
    Transitive(Identifier),
    /// One or more edges, each labelled with any of these predicates
    AnyOf(Vec<Identifier>),
    /// Exactly these predicates, in this order
    Sequence(Vec<Identifier>),
}

/// A lineage predicate: whether the provenance graph holds a path from one
/// endpoint to the other. If either endpoint is not a node of the graph the
/// check abstains, since missing provenance says nothing either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageCheck {
    /// Where the path starts
    pub from: Endpoint,
    /// The edges the path may use
    pub via: Via,
    /// Where the path ends
    pub to: Endpoint,
}

/// The condition under which a [`crate::Rule`] fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Always holds
    Always,
    /// An attribute predicate
    Attribute(AttributeCheck),
    /// A lineage predicate
    Lineage(LineageCheck),
    /// Holds when every operand holds
    All(Vec<Condition>),
    /// Holds when some operand holds
    Any(Vec<Condition>),
    /// Holds when the operand fails
    Not(Box<Condition>),
}

impl Condition {
    /// An attribute predicate
    pub fn attribute(scope: Scope, key: impl Into<String>, comparison: Comparison) -> Self {
        Condition::Attribute(AttributeCheck {
            scope,
            key: key.into(),
            comparison,
        })
    }

    /// An attribute predicate that holds when the attribute equals `value`
    pub fn equals(scope: Scope, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::attribute(
            scope,
            key,
            Comparison::Equals {
                value: value.into(),
            },
        )
    }

    /// A lineage predicate over the transitive closure of one predicate
    pub fn reachable(from: Endpoint, via: &str, to: Endpoint) -> Result<Self, ProvenanceGraphError> {
        Ok(Condition::Lineage(LineageCheck {
            from,
            via: Via::Transitive(via.parse()?),
            to,
        }))
    }

    /// A lineage predicate over any of several predicates
    pub fn reachable_any(from: Endpoint, via: Vec<Identifier>, to: Endpoint) -> Self {
        Condition::Lineage(LineageCheck {
            from,
            via: Via::AnyOf(via),
            to,
        })
    }

    /// The negation of this condition
    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub(crate) fn evaluate(&self, environment: &Environment<'_>) -> Result<Truth, ProvenanceGraphError> {
        match self {
            Condition::Always => Ok(Truth::from(true)),
            Condition::Attribute(check) => Ok(check.evaluate(environment)),
            Condition::Lineage(check) => check.evaluate(environment),
            Condition::All(conditions) => {
                let mut unknown = false;
                let mut evidence = None;

                for condition in conditions {
                    match condition.evaluate(environment)? {
                        Truth::Fails => return Ok(Truth::Fails),
                        Truth::Unknown => unknown = true,
                        Truth::Holds { witness } => evidence = evidence.or(witness),
                    }
                }

                Ok(if unknown {
                    Truth::Unknown
                } else {
                    Truth::Holds { witness: evidence }
                })
            }
            Condition::Any(conditions) => {
                let mut unknown = false;

                for condition in conditions {
                    match condition.evaluate(environment)? {
                        holds @ Truth::Holds { .. } => return Ok(holds),
                        Truth::Unknown => unknown = true,
                        Truth::Fails => (),
                    }
                }

                Ok(if unknown { Truth::Unknown } else { Truth::Fails })
            }
            Condition::Not(condition) => Ok(match condition.evaluate(environment)? {
                Truth::Holds { .. } => Truth::Fails,
                Truth::Fails => Truth::from(true),
                Truth::Unknown => Truth::Unknown,
            }),
        }
    }

    pub(crate) fn validate(&self, vocabulary: Option<&Vocabulary>) -> Result<(), RuleDefect> {
        match self {
            Condition::Always => Ok(()),
            Condition::Attribute(check) => check.validate(vocabulary),
            Condition::Lineage(check) => check.validate(vocabulary),
            Condition::All(conditions) | Condition::Any(conditions) => {
                if conditions.is_empty() {
                    return Err(RuleDefect::EmptyCombinator);
                }
                conditions
                    .iter()
                    .try_for_each(|condition| condition.validate(vocabulary))
            }
            Condition::Not(condition) => condition.validate(vocabulary),
        }
    }
}

impl AttributeCheck {
    fn evaluate(&self, environment: &Environment<'_>) -> Truth {
        let attributes = match self.scope {
            Scope::Subject => &environment.subject,
            Scope::Target => &environment.target,
            Scope::Context => &environment.request.context,
        };

        match (&self.comparison, attributes.get(&self.key)) {
            (Comparison::Present, actual) => Truth::from(actual.is_some()),
            (_, None) => Truth::Unknown,
            (Comparison::Equals { value }, Some(actual)) => Truth::from(actual == value),
            (Comparison::NotEquals { value }, Some(actual)) => Truth::from(actual != value),
            (Comparison::OneOf { values }, Some(actual)) => Truth::from(values.contains(actual)),
        }
    }

    fn validate(&self, vocabulary: Option<&Vocabulary>) -> Result<(), RuleDefect> {
        if self.key.trim().is_empty() {
            return Err(RuleDefect::EmptyAttributeKey);
        }

        if let Comparison::OneOf { values } = &self.comparison {
            if values.is_empty() {
                return Err(RuleDefect::EmptyChoices);
            }
        }

        if vocabulary.is_some_and(|vocabulary| !vocabulary.knows_attribute(self.scope, &self.key)) {
            return Err(RuleDefect::UnknownAttribute {
                scope: self.scope,
                key: self.key.clone(),
            });
        }

        Ok(())
    }
}

impl LineageCheck {
    fn evaluate(&self, environment: &Environment<'_>) -> Result<Truth, ProvenanceGraphError> {
        let (Some(from), Some(to)) = (environment.resolve(&self.from), environment.resolve(&self.to))
        else {
            return Ok(Truth::Unknown);
        };

        let graph = environment.lineage.graph();
        if !graph.contains_identifier(&from) || !graph.contains_identifier(&to) {
            return Ok(Truth::Unknown);
        }

        let lineage = &environment.lineage;
        let path = match &self.via {
            Via::Transitive(predicate) => lineage.path(&from, predicate, &to)?,
            Via::AnyOf(predicates) => lineage.path_any(&from, predicates, &to)?,
            Via::Sequence(predicates) => lineage.follows(&from, predicates, &to)?,
        };

        Ok(match path {
            Some(witness) => Truth::Holds {
                witness: Some(witness),
            },
            None => Truth::Fails,
        })
    }

    fn validate(&self, vocabulary: Option<&Vocabulary>) -> Result<(), RuleDefect> {
        for endpoint in [&self.from, &self.to] {
            if let Endpoint::Context(key) = endpoint {
                if key.trim().is_empty() {
                    return Err(RuleDefect::EmptyContextKey);
                }
            }
        }

        let predicates = match &self.via {
            Via::Transitive(predicate) => std::slice::from_ref(predicate),
            Via::AnyOf(predicates) if predicates.is_empty() => {
                return Err(RuleDefect::EmptyPredicateSet);
            }
            Via::Sequence(predicates) if predicates.is_empty() => {
                return Err(RuleDefect::EmptySequence);
            }
            Via::AnyOf(predicates) | Via::Sequence(predicates) => predicates.as_slice(),
        };

        if let Some(vocabulary) = vocabulary {
            if let Some(predicate) = predicates
                .iter()
                .find(|predicate| !vocabulary.knows_predicate(predicate))
            {
                return Err(RuleDefect::UnknownPredicate {
                    predicate: predicate.clone(),
                });
            }
        }

        Ok(())
    }
}

/// The three-valued result of evaluating a [`Condition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Truth {
    /// The condition holds; lineage checks carry the path that proves it
    Holds { witness: Option<Vec<Identifier>> },
    /// The condition does not hold
    Fails,
    /// The condition cannot be decided for this request
    Unknown,
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        if value {
            Truth::Holds { witness: None }
        } else {
            Truth::Fails
        }
    }
}

/// Everything a [`Condition`] may consult while one request is evaluated
pub(crate) struct Environment<'a> {
    pub request: &'a DecisionRequest,
    pub subject: Attributes,
    pub target: Attributes,
    pub lineage: Lineage<'a>,
}

impl Environment<'_> {
    fn resolve(&self, endpoint: &Endpoint) -> Option<Identifier> {
        match endpoint {
            Endpoint::Subject => Some(self.request.subject.clone()),
            Endpoint::Target => Some(self.request.target.clone()),
            Endpoint::Node(identifier) => Some(identifier.clone()),
            Endpoint::Context(key) => self
                .request
                .context
                .get(key)
                .and_then(AttributeValue::as_str)
                .and_then(|value| value.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use provenance_graph::{Deadline, make_store};

    use super::*;

    fn environment<'a>(
        request: &'a DecisionRequest,
        graph: &'a provenance_graph::Graph,
    ) -> Environment<'a> {
        Environment {
            request,
            subject: Attributes::default().with("clearance", "secret"),
            target: Attributes::default(),
            lineage: Lineage::new(graph, Deadline::never()),
        }
    }

    #[test]
    fn it_abstains_when_an_attribute_is_missing() -> Result<()> {
        let store = make_store(&[])?;
        let graph = store.snapshot();
        let request = DecisionRequest::new("alice".parse()?, "read".parse()?, "doc1".parse()?);
        let environment = environment(&request, &graph);

        let missing = Condition::equals(Scope::Target, "classification", "public");
        let present = Condition::attribute(Scope::Target, "classification", Comparison::Present);
        let matching = Condition::equals(Scope::Subject, "clearance", "secret");

        assert_eq!(missing.evaluate(&environment)?, Truth::Unknown);
        assert_eq!(present.evaluate(&environment)?, Truth::Fails);
        assert_eq!(matching.evaluate(&environment)?, Truth::from(true));
        Ok(())
    }

    #[test]
    fn it_abstains_when_an_endpoint_is_not_in_the_graph() -> Result<()> {
        let store = make_store(&[("doc1", "derivedFrom", "restrictedSource")])?;
        let graph = store.snapshot();
        let request = DecisionRequest::new("alice".parse()?, "export".parse()?, "doc2".parse()?);
        let environment = environment(&request, &graph);

        let condition = Condition::reachable(
            Endpoint::Target,
            "derivedFrom",
            Endpoint::node("restrictedSource")?,
        )?;

        assert_eq!(condition.evaluate(&environment)?, Truth::Unknown);
        assert_eq!(condition.negate().evaluate(&environment)?, Truth::Unknown);
        Ok(())
    }

    #[test]
    fn it_reads_lineage_endpoints_from_the_context() -> Result<()> {
        let store = make_store(&[("doc1", "derivedFrom", "restrictedSource")])?;
        let graph = store.snapshot();
        let request = DecisionRequest::new("alice".parse()?, "export".parse()?, "doc1".parse()?)
            .with_context("source", "restrictedSource");
        let environment = environment(&request, &graph);

        let condition = Condition::reachable(
            Endpoint::Target,
            "derivedFrom",
            Endpoint::Context("source".into()),
        )?;
        let missing_key = Condition::reachable(
            Endpoint::Target,
            "derivedFrom",
            Endpoint::Context("nope".into()),
        )?;

        assert_eq!(
            condition.evaluate(&environment)?,
            Truth::Holds {
                witness: Some(vec!["doc1".parse()?, "restrictedSource".parse()?])
            }
        );
        assert_eq!(missing_key.evaluate(&environment)?, Truth::Unknown);
        Ok(())
    }

    #[test]
    fn it_combines_with_three_valued_logic() -> Result<()> {
        let store = make_store(&[])?;
        let graph = store.snapshot();
        let request = DecisionRequest::new("alice".parse()?, "read".parse()?, "doc1".parse()?);
        let environment = environment(&request, &graph);

        let holds = Condition::Always;
        let fails = Condition::equals(Scope::Subject, "clearance", "public");
        let unknown = Condition::equals(Scope::Target, "owner", "alice");

        let all = |conditions: Vec<Condition>| Condition::All(conditions).evaluate(&environment);
        let any = |conditions: Vec<Condition>| Condition::Any(conditions).evaluate(&environment);

        assert_eq!(all(vec![holds.clone(), unknown.clone()])?, Truth::Unknown);
        assert_eq!(all(vec![unknown.clone(), fails.clone()])?, Truth::Fails);
        assert_eq!(any(vec![unknown.clone(), holds.clone()])?, Truth::from(true));
        assert_eq!(any(vec![fails.clone(), unknown.clone()])?, Truth::Unknown);
        assert_eq!(any(vec![fails.clone()])?, Truth::Fails);
        assert_eq!(fails.negate().evaluate(&environment)?, Truth::from(true));
        Ok(())
    }

    #[test]
    fn it_reads_conditions_from_json() -> Result<()> {
        let condition: Condition = serde_json::from_str(
            r#"{
                "all": [
                    { "attribute": { "scope": "subject", "key": "clearance", "op": "one_of", "values": ["secret", "top-secret"] } },
                    { "not": { "lineage": { "from": "target", "via": { "any_of": ["derivedFrom", "copiedFrom"] }, "to": { "node": "restrictedSource" } } } }
                ]
            }"#,
        )?;

        assert_eq!(
            condition,
            Condition::All(vec![
                Condition::attribute(
                    Scope::Subject,
                    "clearance",
                    Comparison::OneOf {
                        values: vec!["secret".into(), "top-secret".into()]
                    }
                ),
                Condition::reachable_any(
                    Endpoint::Target,
                    vec!["derivedFrom".parse()?, "copiedFrom".parse()?],
                    Endpoint::node("restrictedSource")?,
                )
                .negate(),
            ])
        );
        Ok(())
    }
}
