use std::{sync::Arc, time::Duration};

use provenance_graph::{CommitSummary, Triple, TripleStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{IngestionFeed, PdpConfig, PdpError};

/// What an [`Ingestor`] did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Batches applied to the graph
    pub batches: usize,
    /// Triples added by those batches
    pub asserted: usize,
    /// Triples in those batches that the graph already held
    pub unchanged: usize,
    /// Batches that could not be read or applied
    pub failed: usize,
}

impl IngestReport {
    fn record(&mut self, summary: &CommitSummary) {
        self.batches += 1;
        self.asserted += summary.asserted;
        self.unchanged += summary.unchanged;
    }
}

/// An [`Ingestor`] moves batches from an [`IngestionFeed`] into a
/// [`TripleStore`]. It runs on its own task, so decisions never wait on the
/// feed, and commits each batch on the blocking pool, since copying a large
/// graph is CPU work.
///
/// A batch that fails (an unreadable document, a full store) is logged and
/// skipped; the ingestor keeps polling until the feed is exhausted or it is
/// cancelled. Cancellation is observed while waiting on the feed or between
/// batches; a batch that has been read is always committed and reported.
pub struct Ingestor<F> {
    store: Arc<TripleStore>,
    feed: F,
    interval: Duration,
}

impl<F> Ingestor<F>
where
    F: IngestionFeed + 'static,
{
    /// Feed `store` from `feed`, as fast as the feed produces batches
    pub fn new(store: Arc<TripleStore>, feed: F) -> Self {
        Self {
            store,
            feed,
            interval: Duration::ZERO,
        }
    }

    /// Feed `store` from `feed`, pausing between batches for the configured
    /// [`PdpConfig::ingest_interval`]
    pub fn from_config(store: Arc<TripleStore>, feed: F, config: &PdpConfig) -> Self {
        Self::new(store, feed).throttle(config.ingest_interval())
    }

    /// Wait at least `interval` between two batches
    pub fn throttle(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Read and commit the next batch. Returns `Ok(None)` once the feed is
    /// exhausted.
    pub async fn run_once(&mut self) -> Result<Option<CommitSummary>, PdpError> {
        match self.feed.next_batch().await? {
            Some(batch) => Self::commit(self.store.clone(), batch).await.map(Some),
            None => Ok(None),
        }
    }

    async fn commit(store: Arc<TripleStore>, batch: Vec<Triple>) -> Result<CommitSummary, PdpError> {
        tokio::task::spawn_blocking(move || store.ingest(batch))
            .await
            .map_err(|error| PdpError::Worker(format!("{error}")))?
            .map_err(PdpError::from)
    }

    /// Ingest until the feed is exhausted or `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) -> IngestReport {
        let mut report = IngestReport::default();

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.feed.next_batch() => batch,
            };

            let committed = match batch {
                Ok(Some(batch)) => Self::commit(self.store.clone(), batch).await,
                Ok(None) => break,
                Err(error) => Err(error),
            };

            match committed {
                Ok(summary) => report.record(&summary),
                Err(error) => {
                    report.failed += 1;
                    tracing::error!(%error, "Provenance batch rejected");
                }
            }

            if !self.interval.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => (),
                }
            }
        }

        tracing::info!(
            batches = report.batches,
            asserted = report.asserted,
            failed = report.failed,
            "Ingestion stopped"
        );
        report
    }

    /// Run on a new task until the feed is exhausted or `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<IngestReport> {
        tokio::spawn(self.run(cancel))
    }
}
