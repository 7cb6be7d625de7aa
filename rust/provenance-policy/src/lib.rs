#![warn(missing_docs)]

//! Policy rules for a provenance-aware decision point, and the [`Evaluator`]
//! that applies them.
//!
//! A [`PolicyRuleSet`] maps each action to an ordered list of [`Rule`]s. A
//! rule couples an [`Effect`] with a [`Condition`]; conditions combine
//! attribute checks on the subject, the target and the request context with
//! lineage checks over a provenance [`Graph`](provenance_graph::Graph).
//!
//! Evaluation is fail-closed: the first rule whose condition holds decides
//! the request, and every other path (no rules for the action, every rule
//! abstaining, a traversal that runs out of time, an internal failure) ends
//! in [`Outcome::Deny`].
//!
//! ```ignore
//! use provenance_policy::{Condition, DecisionRequest, Evaluator, PolicyRuleSet, Rule};
//!
//! let rules = PolicyRuleSet::default().with(
//!     "export".parse()?,
//!     vec![
//!         Rule::deny(Condition::reachable(Endpoint::Target, "derivedFrom", Endpoint::node("restrictedSource")?)?),
//!         Rule::allow(Condition::Always),
//!     ],
//! );
//!
//! let graph = store.snapshot();
//! let decision = Evaluator::new(&rules, &graph)
//!     .evaluate(&DecisionRequest::new(subject, "export".parse()?, document), Deadline::never());
//! ```

mod attribute;
pub use attribute::*;

mod condition;
pub use condition::*;

mod decision;
pub use decision::*;

mod error;
pub use error::*;

mod evaluator;
pub use evaluator::*;

mod request;
pub use request::*;

mod rule;
pub use rule::*;

mod rule_set;
pub use rule_set::*;
