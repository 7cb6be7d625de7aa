#![warn(missing_docs)]

//! This package embodies the provenance graph used by the decision point: a
//! [`TripleStore`] that holds (subject, predicate, object) statements behind
//! three indexes, and a [`Lineage`] engine that answers reachability and path
//! queries over an immutable [`Graph`] snapshot of that store.
//!
//! ```ignore
//! use provenance_graph::{Deadline, Lineage, Triple, TripleSelector, TripleStore};
//!
//! let store = TripleStore::default();
//! store.ingest([
//!     Triple::parse("doc1", "derivedFrom", "draft")?,
//!     Triple::parse("draft", "derivedFrom", "restrictedSource")?,
//! ])?;
//!
//! let graph = store.snapshot();
//! let lineage = Lineage::new(&graph, Deadline::never());
//!
//! assert!(lineage.reachable("doc1", "derivedFrom", "restrictedSource")?);
//! assert_eq!(graph.select(&TripleSelector::default().subject("doc1".parse()?)).count(), 1);
//! ```

mod deadline;
pub use deadline::*;

mod document;
pub use document::*;

mod error;
pub use error::*;

mod graph;
pub use graph::*;

mod identifier;
pub use identifier::*;

mod lineage;
pub use lineage::*;

mod store;
pub use store::*;

mod triple;
pub use triple::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
