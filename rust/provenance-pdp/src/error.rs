use std::path::PathBuf;

use provenance_graph::ProvenanceGraphError;
use provenance_policy::{Decision, PolicyError};
use thiserror::Error;

/// Errors raised by the decision point outside of decision evaluation.
/// Evaluation failures never surface here; they resolve to a deny
/// [`Decision`] instead.
#[derive(Error, Debug)]
pub enum PdpError {
    /// The configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file being read
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML
    #[error("Malformed configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON document (attributes, vocabulary) could not be parsed
    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The provenance graph rejected an operation
    #[error(transparent)]
    Graph(#[from] ProvenanceGraphError),

    /// The policy rules were rejected
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The worker pool has no room for another request
    #[error("Decision point is busy: {in_flight} evaluating, {waiting} waiting")]
    Busy {
        /// Requests holding a worker
        in_flight: usize,
        /// Requests queued for a worker
        waiting: usize,
    },

    /// A worker could not run or finish a job
    #[error("Worker failed: {0}")]
    Worker(String),

    /// An enforced request was denied
    #[error("Not authorized: {0}")]
    NotAuthorized(Box<Decision>),

    /// An ingestion feed failed to produce its next batch
    #[error("Ingestion feed failed: {0}")]
    Feed(String),
}
