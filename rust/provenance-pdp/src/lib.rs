#![warn(missing_docs)]

//! A provenance-aware policy decision point.
//!
//! The [`PolicyDecisionPoint`] is the entry point for callers: it answers
//! "may this subject perform this action on this target?" by evaluating a
//! [`provenance_policy::PolicyRuleSet`] against a shared
//! [`provenance_graph::TripleStore`]. Decisions run on a bounded
//! [`WorkerPool`]; provenance arrives through an [`IngestionFeed`] drained by
//! an [`Ingestor`] on its own task.
//!
//! Every decision resolves to allow or deny. Overload, timeouts and internal
//! failures deny; they never raise.

mod config;
pub use config::*;

mod error;
pub use error::*;

mod feed;
pub use feed::*;

mod ingest;
pub use ingest::*;

mod pdp;
pub use pdp::*;

mod pool;
pub use pool::*;
