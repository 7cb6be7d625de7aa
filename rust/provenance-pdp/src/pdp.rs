use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use provenance_graph::{CommitSummary, Deadline, Identifier, TripleStore, Triple};
use provenance_policy::{
    AttributeResolver, Decision, DecisionRequest, Evaluator, NoAttributes, PolicyError,
    PolicyRuleSet, Reason, StaticAttributes, Vocabulary,
};

use crate::{PdpConfig, PdpError, WorkerPool};

/// The [`PolicyDecisionPoint`] answers authorization requests against the
/// active [`PolicyRuleSet`] and the provenance held in a shared
/// [`TripleStore`].
///
/// Each decision takes the current graph snapshot and rule set when it is
/// submitted and evaluates against exactly those, on a bounded
/// [`WorkerPool`]. Ingestion and rule replacement may proceed concurrently;
/// they never disturb a decision already under way.
pub struct PolicyDecisionPoint {
    store: Arc<TripleStore>,
    rules: RwLock<Arc<PolicyRuleSet>>,
    vocabulary: Option<Vocabulary>,
    attributes: Arc<dyn AttributeResolver>,
    pool: WorkerPool,
    decision_timeout: Duration,
}

impl PolicyDecisionPoint {
    /// A decision point over `store` with the default configuration
    pub fn new(store: Arc<TripleStore>, rules: PolicyRuleSet) -> Result<Self, PdpError> {
        Self::with_config(store, rules, &PdpConfig::default())
    }

    /// A decision point over `store` sized by `config`. The rules are checked
    /// for structural defects first.
    pub fn with_config(
        store: Arc<TripleStore>,
        rules: PolicyRuleSet,
        config: &PdpConfig,
    ) -> Result<Self, PdpError> {
        config.validate()?;
        rules.validate(None)?;

        Ok(Self {
            store,
            rules: RwLock::new(Arc::new(rules)),
            vocabulary: None,
            attributes: Arc::new(NoAttributes),
            pool: WorkerPool::new(config.workers, config.queue_limit),
            decision_timeout: config.decision_timeout(),
        })
    }

    /// Assemble a decision point from the files named in `config`: a bounded
    /// store, the rule set, and the optional attribute and vocabulary
    /// documents. Provenance documents are not read here; feed them through
    /// an [`crate::Ingestor`].
    pub fn from_config(config: &PdpConfig) -> Result<Self, PdpError> {
        let rules = match &config.policy {
            Some(path) => PolicyRuleSet::from_json(&read(path)?)?,
            None => PolicyRuleSet::default(),
        };
        let store = Arc::new(TripleStore::bounded(config.capacity));
        let mut pdp = Self::with_config(store, rules, config)?;

        if let Some(path) = &config.attributes {
            let attributes: StaticAttributes = serde_json::from_str(&read(path)?)?;
            pdp = pdp.with_attributes(Arc::new(attributes));
        }

        if let Some(path) = &config.vocabulary {
            let vocabulary: Vocabulary = serde_json::from_str(&read(path)?)?;
            pdp = pdp.with_vocabulary(vocabulary)?;
        }

        Ok(pdp)
    }

    /// Resolve subject and target attributes through `attributes`
    pub fn with_attributes(mut self, attributes: Arc<dyn AttributeResolver>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Check the active rules, and every later replacement, against
    /// `vocabulary`
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Result<Self, PdpError> {
        self.rules.read().validate(Some(&vocabulary))?;
        self.vocabulary = Some(vocabulary);
        Ok(self)
    }

    /// The shared provenance store
    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }

    /// The active rule set
    pub fn rules(&self) -> Arc<PolicyRuleSet> {
        self.rules.read().clone()
    }

    /// Decide `request` on the worker pool. This always produces a
    /// [`Decision`]: an overloaded pool, a timeout or an internal failure all
    /// resolve to a deny.
    pub async fn decide(&self, request: DecisionRequest) -> Decision {
        let action = request.action.clone();
        let job = self.prepare(request);

        match self.pool.run(job).await {
            Ok(decision) => decision,
            Err(PdpError::Busy { in_flight, waiting }) => {
                tracing::warn!(%action, in_flight, waiting, "Decision point busy; denying");
                Decision::busy()
            }
            Err(error) => {
                tracing::error!(%action, %error, "Decision could not be evaluated; denying");
                Decision::failed(
                    Reason::EvaluationFailed {
                        action,
                        position: None,
                    },
                    PolicyError::Internal(format!("{error}")),
                )
            }
        }
    }

    /// Decide `request` on the calling thread, bypassing the worker pool
    pub fn decide_now(&self, request: DecisionRequest) -> Decision {
        self.prepare(request)()
    }

    /// Decide whether `subject` may perform `action` on `target`, with no
    /// request context
    pub async fn check(&self, subject: &str, action: &str, target: &str) -> Result<Decision, PdpError> {
        let request = DecisionRequest::new(
            parse(subject)?,
            parse(action)?,
            parse(target)?,
        );
        Ok(self.decide(request).await)
    }

    /// Decide `request`, turning a deny into [`PdpError::NotAuthorized`]
    pub async fn enforce(&self, request: DecisionRequest) -> Result<Decision, PdpError> {
        let decision = self.decide(request).await;

        if decision.is_allowed() {
            Ok(decision)
        } else {
            Err(PdpError::NotAuthorized(Box::new(decision)))
        }
    }

    /// Add a batch of triples to the provenance graph
    pub fn ingest<I>(&self, batch: I) -> Result<CommitSummary, PdpError>
    where
        I: IntoIterator<Item = Triple>,
    {
        Ok(self.store.ingest(batch)?)
    }

    /// Remove a batch of triples from the provenance graph
    pub fn remove<I>(&self, batch: I) -> Result<CommitSummary, PdpError>
    where
        I: IntoIterator<Item = Triple>,
    {
        Ok(self.store.remove(batch)?)
    }

    /// Replace the active rule set. The new rules are validated first; if
    /// they are rejected the previous rules stay active. Decisions already
    /// under way finish with the rules they started with.
    pub fn replace_rules(&self, rules: PolicyRuleSet) -> Result<(), PdpError> {
        if let Err(error) = rules.validate(self.vocabulary.as_ref()) {
            tracing::warn!(%error, "Rejected replacement rule set");
            return Err(error.into());
        }

        let actions = rules.len();
        *self.rules.write() = Arc::new(rules);
        tracing::info!(actions, "Replaced active rule set");
        Ok(())
    }

    fn prepare(&self, request: DecisionRequest) -> impl FnOnce() -> Decision + Send + 'static {
        let graph = self.store.snapshot();
        let rules = self.rules();
        let attributes = self.attributes.clone();
        let timeout = self.decision_timeout;

        move || {
            Evaluator::new(&rules, &graph)
                .with_attributes(attributes.as_ref())
                .evaluate(&request, Deadline::after(timeout))
        }
    }
}

fn parse(identifier: &str) -> Result<Identifier, PdpError> {
    Ok(identifier.parse()?)
}

fn read(path: &std::path::Path) -> Result<String, PdpError> {
    std::fs::read_to_string(path).map_err(|source| PdpError::Io {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use provenance_graph::make_triple;
    use provenance_policy::{Condition, Endpoint, Outcome, Rule, Scope};

    use super::*;

    fn export_rules() -> Result<PolicyRuleSet> {
        Ok(PolicyRuleSet::default().with(
            "export".parse()?,
            vec![
                Rule::deny(Condition::reachable(
                    Endpoint::Target,
                    "derivedFrom",
                    Endpoint::node("restrictedSource")?,
                )?),
                Rule::allow(Condition::Always),
            ],
        ))
    }

    #[tokio::test]
    async fn it_decides_against_ingested_provenance() -> Result<()> {
        let pdp = PolicyDecisionPoint::new(Arc::new(TripleStore::default()), export_rules()?)?;

        assert!(pdp.check("alice", "export", "doc1").await?.is_allowed());

        pdp.ingest([make_triple("doc1", "derivedFrom", "restrictedSource")?])?;
        assert!(!pdp.check("alice", "export", "doc1").await?.is_allowed());

        pdp.remove([make_triple("doc1", "derivedFrom", "restrictedSource")?])?;
        assert!(pdp.check("alice", "export", "doc1").await?.is_allowed());
        Ok(())
    }

    #[tokio::test]
    async fn it_enforces_by_failing_on_deny() -> Result<()> {
        let pdp = PolicyDecisionPoint::new(Arc::new(TripleStore::default()), export_rules()?)?;
        pdp.ingest([make_triple("doc1", "derivedFrom", "restrictedSource")?])?;

        let allowed = pdp
            .enforce(DecisionRequest::new("alice".parse()?, "export".parse()?, "doc2".parse()?))
            .await?;
        assert_eq!(allowed.outcome, Outcome::Allow);

        let denied = pdp
            .enforce(DecisionRequest::new("alice".parse()?, "export".parse()?, "doc1".parse()?))
            .await;
        assert!(matches!(
            denied,
            Err(PdpError::NotAuthorized(decision)) if decision.outcome == Outcome::Deny
        ));

        let unregistered = pdp
            .enforce(DecisionRequest::new("alice".parse()?, "delete".parse()?, "doc2".parse()?))
            .await;
        assert!(matches!(
            unregistered,
            Err(PdpError::NotAuthorized(decision)) if matches!(decision.reason, Reason::NoPolicy { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_invalid_identifiers() -> Result<()> {
        let pdp = PolicyDecisionPoint::new(Arc::new(TripleStore::default()), export_rules()?)?;

        assert!(matches!(
            pdp.check("alice", "", "doc1").await,
            Err(PdpError::Graph(_))
        ));
        Ok(())
    }

    #[test]
    fn it_keeps_the_previous_rules_when_a_replacement_is_rejected() -> Result<()> {
        let pdp = PolicyDecisionPoint::new(Arc::new(TripleStore::default()), export_rules()?)?
            .with_vocabulary(Vocabulary::default().predicate("derivedFrom".parse()?))?;
        let before = pdp.rules();

        let unknown_predicate = PolicyRuleSet::default().with(
            "export".parse()?,
            vec![Rule::deny(Condition::reachable(
                Endpoint::Target,
                "copiedFrom",
                Endpoint::node("restrictedSource")?,
            )?)],
        );
        let empty_choice = PolicyRuleSet::default().with(
            "read".parse()?,
            vec![Rule::allow(Condition::Any(vec![]))],
        );

        assert!(matches!(
            pdp.replace_rules(unknown_predicate),
            Err(PdpError::Policy(PolicyError::MalformedRule { .. }))
        ));
        assert!(matches!(
            pdp.replace_rules(empty_choice),
            Err(PdpError::Policy(PolicyError::MalformedRule { .. }))
        ));
        assert_eq!(pdp.rules(), before);

        let read_only = PolicyRuleSet::default().with(
            "read".parse()?,
            vec![Rule::allow(Condition::equals(Scope::Context, "purpose", "audit"))],
        );
        pdp.replace_rules(read_only.clone())?;
        assert_eq!(*pdp.rules(), read_only);

        let decision = pdp.decide_now(
            DecisionRequest::new("alice".parse()?, "read".parse()?, "doc1".parse()?)
                .with_context("purpose", "audit"),
        );
        assert!(decision.is_allowed());
        Ok(())
    }
}
