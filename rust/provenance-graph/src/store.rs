use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};

use crate::{Graph, Instruction, ProvenanceGraphError, Triple};

/// What a successful [`TripleStore::commit`] changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Triples that were newly added
    pub asserted: usize,
    /// Triples that were removed
    pub retracted: usize,
    /// Instructions that had no effect (duplicate assertions, retractions of
    /// absent triples)
    pub unchanged: usize,
    /// The version of the graph after the commit
    pub version: u64,
}

/// [`TripleStore`] is the shared, exclusively-owning home of the provenance
/// graph.
///
/// Readers call [`TripleStore::snapshot`] and receive an immutable
/// [`Graph`] that stays consistent for as long as they hold it. Writers are
/// serialized; each batch of [`Instruction`]s is validated against the
/// current graph first and then applied as a unit, producing the next graph
/// version. A reader therefore sees either all of a batch or none of it.
///
/// The store has a triple capacity. A batch that would exceed it is rejected
/// with [`ProvenanceGraphError::StorageExhausted`] and the store enters a
/// degraded mode in which further assertions are refused; retractions are
/// still accepted, and once the store is back under capacity it leaves the
/// degraded mode.
pub struct TripleStore {
    current: RwLock<Arc<Graph>>,
    writer: Mutex<()>,
    capacity: usize,
    degraded: AtomicBool,
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::bounded(usize::MAX)
    }
}

impl TripleStore {
    /// Initialize an empty store with no practical capacity limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize an empty store that holds at most `capacity` triples
    pub fn bounded(capacity: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(Graph::default())),
            writer: Mutex::new(()),
            capacity,
            degraded: AtomicBool::new(false),
        }
    }

    /// The maximum number of triples this store will hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the store is refusing new assertions after exhaustion
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// The current number of triples
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// True when the store holds no triples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the latest published [`Graph`]
    pub fn snapshot(&self) -> Arc<Graph> {
        self.current.read().clone()
    }

    /// Assert every [`Triple`] of the batch
    pub fn ingest<I>(&self, batch: I) -> Result<CommitSummary, ProvenanceGraphError>
    where
        I: IntoIterator<Item = Triple>,
    {
        self.commit(batch.into_iter().map(Instruction::Assert))
    }

    /// Retract every [`Triple`] of the batch. This is an administrative
    /// operation and is never used while evaluating decisions.
    pub fn remove<I>(&self, batch: I) -> Result<CommitSummary, ProvenanceGraphError>
    where
        I: IntoIterator<Item = Triple>,
    {
        self.commit(batch.into_iter().map(Instruction::Retract))
    }

    /// Apply a batch of [`Instruction`]s in order, atomically with respect to
    /// readers. Either the whole batch is applied or none of it is.
    ///
    /// The batch is applied to a private copy of the current graph, so the
    /// lock that readers share is held exclusively only to swap it in.
    pub fn commit<I>(&self, instructions: I) -> Result<CommitSummary, ProvenanceGraphError>
    where
        I: IntoIterator<Item = Instruction>,
    {
        let instructions: Vec<Instruction> = instructions.into_iter().collect();
        let _writer = self.writer.lock();
        let base = self.snapshot();

        let (added, removed) = {
            let mut projected: HashMap<&Triple, bool> = HashMap::new();
            for instruction in &instructions {
                projected.insert(instruction.triple(), instruction.is_assert());
            }

            projected
                .into_iter()
                .fold((0, 0), |(added, removed), (triple, present)| {
                    match (present, base.contains(triple)) {
                        (true, false) => (added + 1, removed),
                        (false, true) => (added, removed + 1),
                        _ => (added, removed),
                    }
                })
        };

        if added > 0 && self.is_degraded() {
            tracing::warn!(
                len = base.len(),
                capacity = self.capacity,
                "Rejecting provenance batch while the triple store is degraded"
            );
            return Err(ProvenanceGraphError::IngestDisabled {
                len: base.len(),
                capacity: self.capacity,
            });
        }

        let attempted = (base.len() - removed).saturating_add(added);
        if attempted > self.capacity {
            self.degraded.store(true, Ordering::Release);
            tracing::error!(
                capacity = self.capacity,
                attempted,
                "Triple store exhausted; new provenance will be rejected until triples are removed"
            );
            return Err(ProvenanceGraphError::StorageExhausted {
                capacity: self.capacity,
                attempted,
            });
        }

        if added == 0 && removed == 0 {
            return Ok(CommitSummary {
                unchanged: instructions.len(),
                version: base.version(),
                ..Default::default()
            });
        }

        let expected = base.version();
        let mut next = Graph::clone(&base);
        drop(base);

        // Readers keep taking snapshots of the published graph while the
        // batch is applied to a private copy
        let mut summary = CommitSummary::default();

        for instruction in instructions {
            let changed = match instruction {
                Instruction::Assert(triple) => {
                    let changed = next.assert(triple);
                    summary.asserted += changed as usize;
                    changed
                }
                Instruction::Retract(triple) => {
                    let changed = next.retract(&triple);
                    summary.retracted += changed as usize;
                    changed
                }
            };
            summary.unchanged += !changed as usize;
        }

        next.advance();
        summary.version = next.version();
        let len = next.len();

        let previous = {
            let mut current = self.current.write();

            if current.version() != expected {
                tracing::error!(
                    expected,
                    found = current.version(),
                    "Provenance graph changed underneath the ingest lock"
                );
                return Err(ProvenanceGraphError::ConcurrentIngestConflict {
                    expected,
                    found: current.version(),
                });
            }

            std::mem::replace(&mut *current, Arc::new(next))
        };
        drop(previous);

        if len < self.capacity && self.degraded.swap(false, Ordering::AcqRel) {
            tracing::info!(
                len,
                capacity = self.capacity,
                "Triple store is back under capacity; accepting provenance again"
            );
        }

        tracing::debug!(
            asserted = summary.asserted,
            retracted = summary.retracted,
            version = summary.version,
            "Committed provenance batch"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{TripleSelector, make_chain, make_triple};

    #[test]
    fn it_ingests_idempotently() -> Result<()> {
        let store = TripleStore::default();
        let triple = make_triple("doc1", "derivedFrom", "source")?;

        let first = store.ingest([triple.clone()])?;
        let second = store.ingest([triple.clone()])?;

        assert_eq!(first.asserted, 1);
        assert_eq!(second.asserted, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.version, first.version);
        assert_eq!(
            store
                .snapshot()
                .select(&TripleSelector::from(&triple))
                .count(),
            1
        );
        Ok(())
    }

    #[test]
    fn it_keeps_old_snapshots_unchanged() -> Result<()> {
        let store = TripleStore::default();
        store.ingest(make_chain("p", &["a", "b"])?)?;

        let before = store.snapshot();
        store.ingest(make_chain("p", &["b", "c", "d"])?)?;
        let after = store.snapshot();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 3);
        assert!(after.version() > before.version());
        Ok(())
    }

    #[test]
    fn it_rejects_a_batch_that_exceeds_capacity_as_a_whole() -> Result<()> {
        let store = TripleStore::bounded(3);
        store.ingest(make_chain("p", &["a", "b", "c"])?)?;

        let result = store.ingest(make_chain("p", &["c", "d", "e"])?);

        assert_eq!(
            result,
            Err(ProvenanceGraphError::StorageExhausted {
                capacity: 3,
                attempted: 4
            })
        );
        assert_eq!(store.len(), 2);
        assert!(store.is_degraded());
        Ok(())
    }

    #[test]
    fn it_refuses_assertions_until_removal_frees_capacity() -> Result<()> {
        let store = TripleStore::bounded(2);
        store.ingest(make_chain("p", &["a", "b", "c"])?)?;
        assert!(store.ingest([make_triple("c", "p", "d")?]).is_err());

        let refused = store.ingest([make_triple("x", "p", "y")?]);
        assert!(matches!(
            refused,
            Err(ProvenanceGraphError::IngestDisabled { .. })
        ));

        store.remove([make_triple("a", "p", "b")?])?;
        assert!(!store.is_degraded());

        store.ingest([make_triple("x", "p", "y")?])?;
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[test]
    fn it_applies_mixed_instructions_in_order() -> Result<()> {
        let store = TripleStore::default();
        let triple = make_triple("a", "p", "b")?;

        let summary = store.commit([
            Instruction::Assert(triple.clone()),
            Instruction::Retract(triple.clone()),
            Instruction::Assert(make_triple("b", "p", "c")?),
        ])?;

        assert_eq!(summary.asserted, 2);
        assert_eq!(summary.retracted, 1);
        assert!(!store.snapshot().contains(&triple));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn it_serves_snapshots_while_a_large_batch_commits() -> Result<()> {
        let store = TripleStore::default();
        store.ingest(
            (0..100_000)
                .map(|n| make_triple(&format!("n{n}"), "derivedFrom", &format!("n{}", n + 1)))
                .collect::<Result<Vec<_>>>()?,
        )?;
        let held = store.snapshot();
        let committed = AtomicBool::new(false);

        let (commit_took, slowest_snapshot) = std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                let started = Instant::now();
                let result = store.ingest([make_triple("n0", "derivedFrom", "origin")?]);
                committed.store(true, Ordering::Release);
                result?;
                anyhow::Ok(started.elapsed())
            });

            let mut slowest = Duration::ZERO;
            while !committed.load(Ordering::Acquire) {
                let started = Instant::now();
                let snapshot = store.snapshot();
                slowest = slowest.max(started.elapsed());
                drop(snapshot);
                std::thread::yield_now();
            }

            let commit_took = writer
                .join()
                .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
            anyhow::Ok((commit_took, slowest))
        })?;

        assert!(
            slowest_snapshot < commit_took / 2,
            "snapshot waited {slowest_snapshot:?} on a commit of {commit_took:?}"
        );
        assert_eq!(held.len(), 100_000);
        assert_eq!(store.len(), 100_001);
        Ok(())
    }
}
