use std::time::Duration;

use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProvenanceGraphError {
    /// The store would grow beyond its configured triple capacity. The
    /// offending batch is rejected whole.
    #[error("Triple store exhausted: capacity is {capacity} triples, batch would grow it to {attempted}")]
    StorageExhausted {
        /// The configured maximum number of triples
        capacity: usize,
        /// The number of triples the store would hold after the batch
        attempted: usize,
    },

    /// The store is in its degraded mode after exhaustion and refuses new
    /// assertions until enough triples are removed
    #[error("Ingestion is disabled while the triple store is degraded ({len} of {capacity} triples)")]
    IngestDisabled {
        /// The number of triples currently held
        len: usize,
        /// The configured maximum number of triples
        capacity: usize,
    },

    /// A string could not be interpreted as an identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A lineage traversal was stopped because its deadline expired
    #[error("Lineage traversal timed out after {elapsed:?} ({visited} nodes visited)")]
    Timeout {
        /// Time spent before the traversal gave up
        elapsed: Duration,
        /// Number of nodes visited before the traversal gave up
        visited: usize,
    },

    /// A snapshot was modified by someone other than the writer holding the
    /// ingest lock
    #[error("Concurrent ingest conflict: expected graph version {expected}, found {found}")]
    ConcurrentIngestConflict {
        /// The version observed when the batch was prepared
        expected: u64,
        /// The version found when the batch was published
        found: u64,
    },

    /// A provenance document could not be parsed into triples
    #[error("Malformed provenance document at line {line}: {reason}")]
    MalformedDocument {
        /// One-based line number (zero for whole-document failures)
        line: usize,
        /// What was wrong with it
        reason: String,
    },
}

impl From<serde_json::Error> for ProvenanceGraphError {
    fn from(value: serde_json::Error) -> Self {
        ProvenanceGraphError::MalformedDocument {
            line: value.line(),
            reason: format!("{value}"),
        }
    }
}
