use std::time::{Duration, Instant};

use crate::ProvenanceGraphError;

/// A [`Deadline`] bounds how long a lineage traversal may run. Traversals
/// check it as they expand nodes and stop with
/// [`ProvenanceGraphError::Timeout`] once it has passed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires
    pub fn never() -> Self {
        Self {
            started: Instant::now(),
            expires: None,
        }
    }

    /// A deadline that expires `budget` from now
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires: started.checked_add(budget),
        }
    }

    /// Time elapsed since the deadline was set
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|expires| Instant::now() >= expires)
    }

    /// Fail with [`ProvenanceGraphError::Timeout`] if the deadline has passed
    pub fn check(&self, visited: usize) -> Result<(), ProvenanceGraphError> {
        if self.is_expired() {
            return Err(ProvenanceGraphError::Timeout {
                elapsed: self.elapsed(),
                visited,
            });
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}
