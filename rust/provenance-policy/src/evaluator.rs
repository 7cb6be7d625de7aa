use provenance_graph::{Deadline, Graph, Lineage, ProvenanceGraphError};

use crate::{
    AttributeResolver, Decision, DecisionRequest, NoAttributes, Outcome, PolicyError,
    PolicyRuleSet, Reason, condition::Environment, rule::Verdict,
};

/// An [`Evaluator`] decides [`DecisionRequest`]s against one
/// [`PolicyRuleSet`] and one [`Graph`] snapshot.
///
/// It borrows both for its whole lifetime, so every rule of a decision sees
/// the same graph even while ingestion publishes newer snapshots elsewhere.
/// Evaluation is CPU-bound and performs no I/O.
pub struct Evaluator<'a> {
    rules: &'a PolicyRuleSet,
    graph: &'a Graph,
    attributes: &'a dyn AttributeResolver,
}

impl<'a> Evaluator<'a> {
    /// Evaluate `rules` over `graph`, with no subject or target attributes
    pub fn new(rules: &'a PolicyRuleSet, graph: &'a Graph) -> Self {
        Self {
            rules,
            graph,
            attributes: &NoAttributes,
        }
    }

    /// Resolve subject and target attributes through `attributes`
    pub fn with_attributes(mut self, attributes: &'a dyn AttributeResolver) -> Self {
        self.attributes = attributes;
        self
    }

    /// Decide `request`. The first rule that fires decides; when no rule
    /// fires, when the action has no rules, or when evaluation fails, the
    /// request is denied. This never fails: failures are carried in
    /// [`Decision::error`].
    pub fn evaluate(&self, request: &DecisionRequest, deadline: Deadline) -> Decision {
        let action = &request.action;

        let rules = match self.rules.require(action) {
            Ok(rules) => rules,
            Err(_) => {
                tracing::debug!(%action, "No policy registered; denying");
                return Decision::new(
                    Outcome::Deny,
                    Reason::NoPolicy {
                        action: action.clone(),
                    },
                );
            }
        };

        let environment = Environment {
            request,
            subject: self.attributes.subject_attributes(&request.subject),
            target: self.attributes.target_attributes(&request.target),
            lineage: Lineage::new(self.graph, deadline),
        };

        for (position, rule) in rules.iter().enumerate() {
            let verdict = deadline
                .check(0)
                .and_then(|_| rule.apply(&environment));

            match verdict {
                Ok(Verdict::Abstain) => continue,
                Ok(Verdict::Fires { effect, witness }) => {
                    tracing::debug!(
                        %action,
                        subject = %request.subject,
                        target = %request.target,
                        position,
                        %effect,
                        "Rule matched"
                    );
                    return Decision::new(
                        effect.into(),
                        Reason::RuleMatched {
                            action: action.clone(),
                            position,
                            effect,
                            description: rule.description.clone(),
                            witness,
                        },
                    );
                }
                Err(ProvenanceGraphError::Timeout { elapsed, visited }) => {
                    tracing::warn!(
                        %action,
                        target = %request.target,
                        position,
                        ?elapsed,
                        visited,
                        "Rule exceeded the decision deadline; denying"
                    );
                    return Decision::failed(
                        Reason::EvaluationTimeout {
                            action: action.clone(),
                            position,
                        },
                        PolicyError::EvaluationTimeout {
                            action: action.clone(),
                            position,
                            elapsed,
                        },
                    );
                }
                Err(error) => {
                    tracing::error!(%action, position, %error, "Rule failed to evaluate; denying");
                    return Decision::failed(
                        Reason::EvaluationFailed {
                            action: action.clone(),
                            position: Some(position),
                        },
                        PolicyError::Graph {
                            action: action.clone(),
                            position,
                            source: error,
                        },
                    );
                }
            }
        }

        tracing::debug!(%action, evaluated = rules.len(), "Every rule abstained; denying");
        Decision::new(
            Outcome::Deny,
            Reason::AllAbstained {
                action: action.clone(),
                evaluated: rules.len(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use provenance_graph::{make_chain, make_store};

    use super::*;
    use crate::{Condition, Endpoint, Rule, Scope, StaticAttributes};

    #[test]
    fn it_denies_actions_without_a_policy() -> Result<()> {
        let store = make_store(&[])?;
        let graph = store.snapshot();
        let rules = PolicyRuleSet::default();

        let decision = Evaluator::new(&rules, &graph).evaluate(
            &DecisionRequest::new("alice".parse()?, "unregistered_action".parse()?, "doc1".parse()?),
            Deadline::never(),
        );

        assert_eq!(decision.outcome, Outcome::Deny);
        assert!(decision.error.is_none());
        assert!(decision.reason.to_string().contains("no policy for action"));
        Ok(())
    }

    #[test]
    fn it_denies_when_every_rule_abstains() -> Result<()> {
        let store = make_store(&[])?;
        let graph = store.snapshot();
        let rules = PolicyRuleSet::default().with(
            "read".parse()?,
            vec![
                Rule::allow(Condition::equals(Scope::Subject, "clearance", "secret")),
                Rule::allow(Condition::equals(Scope::Subject, "role", "admin")),
            ],
        );

        let decision = Evaluator::new(&rules, &graph).evaluate(
            &DecisionRequest::new("alice".parse()?, "read".parse()?, "doc1".parse()?),
            Deadline::never(),
        );

        assert_eq!(
            decision,
            Decision::new(
                Outcome::Deny,
                Reason::AllAbstained {
                    action: "read".parse()?,
                    evaluated: 2,
                }
            )
        );
        Ok(())
    }

    #[test]
    fn it_consults_the_attribute_resolver() -> Result<()> {
        let store = make_store(&[])?;
        let graph = store.snapshot();
        let rules = PolicyRuleSet::default().with(
            "read".parse()?,
            vec![Rule::allow(Condition::equals(Scope::Subject, "clearance", "secret"))],
        );
        let attributes = StaticAttributes::default().subject(
            "alice".parse()?,
            [("clearance", "secret")].into_iter().collect(),
        );
        let evaluator = Evaluator::new(&rules, &graph).with_attributes(&attributes);

        let alice = evaluator.evaluate(
            &DecisionRequest::new("alice".parse()?, "read".parse()?, "doc1".parse()?),
            Deadline::never(),
        );
        let bob = evaluator.evaluate(
            &DecisionRequest::new("bob".parse()?, "read".parse()?, "doc1".parse()?),
            Deadline::never(),
        );

        assert!(alice.is_allowed());
        assert!(!bob.is_allowed());
        Ok(())
    }

    #[test]
    fn it_denies_with_a_distinct_reason_on_timeout() -> Result<()> {
        let store = make_store(&[])?;
        store.ingest(make_chain("derivedFrom", &["a", "b", "c", "d"])?)?;
        let graph = store.snapshot();
        let rules = PolicyRuleSet::default().with(
            "export".parse()?,
            vec![Rule::allow(Condition::reachable(
                Endpoint::Target,
                "derivedFrom",
                Endpoint::node("d")?,
            )?)],
        );

        let decision = Evaluator::new(&rules, &graph).evaluate(
            &DecisionRequest::new("alice".parse()?, "export".parse()?, "a".parse()?),
            Deadline::after(Duration::ZERO),
        );

        assert_eq!(decision.outcome, Outcome::Deny);
        assert_eq!(
            decision.reason,
            Reason::EvaluationTimeout {
                action: "export".parse()?,
                position: 0,
            }
        );
        assert!(matches!(
            decision.error,
            Some(PolicyError::EvaluationTimeout { position: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn it_cuts_off_a_long_walk_and_skips_later_rules() -> Result<()> {
        let nodes: Vec<String> = (0..300_000).map(|n| format!("n{n}")).collect();
        let names: Vec<&str> = nodes.iter().map(String::as_str).collect();
        let store = make_store(&[])?;
        store.ingest(make_chain("derivedFrom", &names)?)?;
        let graph = store.snapshot();
        let rules = PolicyRuleSet::default().with(
            "export".parse()?,
            vec![
                Rule::deny(Condition::reachable(
                    Endpoint::Target,
                    "derivedFrom",
                    Endpoint::node("restrictedSource")?,
                )?),
                Rule::allow(Condition::Always),
            ],
        );

        let decision = Evaluator::new(&rules, &graph).evaluate(
            &DecisionRequest::new("alice".parse()?, "export".parse()?, "n0".parse()?),
            Deadline::after(Duration::from_millis(2)),
        );

        assert_eq!(decision.outcome, Outcome::Deny);
        assert_eq!(
            decision.reason,
            Reason::EvaluationTimeout {
                action: "export".parse()?,
                position: 0,
            }
        );
        assert!(matches!(
            decision.error,
            Some(PolicyError::EvaluationTimeout { position: 0, elapsed, .. })
                if elapsed >= Duration::from_millis(2)
        ));
        Ok(())
    }
}
