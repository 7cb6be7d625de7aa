use std::{collections::VecDeque, path::PathBuf};

use async_trait::async_trait;
use provenance_graph::{DocumentFormat, Triple, parse_document};
use tokio::sync::mpsc;

use crate::PdpError;

/// A source of provenance facts. Each call yields the next batch of
/// [`Triple`]s to ingest; a batch is applied to the graph as a whole or not
/// at all. `Ok(None)` means the feed is exhausted.
///
/// Feeds may block on external I/O. They are polled by an
/// [`crate::Ingestor`] on its own task, never on the decision path.
/// `next_batch` must be cancel safe: if the future is dropped before it
/// completes, no batch may be lost.
#[async_trait]
pub trait IngestionFeed: Send {
    /// The next batch of triples, or `None` once the feed is exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Triple>>, PdpError>;
}

/// A feed of batches pushed from elsewhere in the process
pub struct ChannelFeed {
    receiver: mpsc::Receiver<Vec<Triple>>,
}

impl ChannelFeed {
    /// A feed and the sender that fills it. The feed is exhausted once every
    /// sender has been dropped and the buffered batches are consumed.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Vec<Triple>>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl IngestionFeed for ChannelFeed {
    async fn next_batch(&mut self) -> Result<Option<Vec<Triple>>, PdpError> {
        Ok(self.receiver.recv().await)
    }
}

/// A feed that reads provenance documents from disk, one batch per
/// document. Files ending in `.json` are read as a JSON array of triples;
/// anything else as one `subject predicate object .` statement per line.
/// A document that fails to parse is rejected whole.
#[derive(Debug, Clone, Default)]
pub struct DocumentFeed {
    paths: VecDeque<PathBuf>,
}

impl DocumentFeed {
    /// A feed over `paths`, read in order
    pub fn new<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IngestionFeed for DocumentFeed {
    async fn next_batch(&mut self) -> Result<Option<Vec<Triple>>, PdpError> {
        let Some(path) = self.paths.front().cloned() else {
            return Ok(None);
        };

        // The path stays queued until its read has finished, either way
        let read = tokio::fs::read_to_string(&path).await;
        self.paths.pop_front();

        let document = read.map_err(|source| PdpError::Io {
            path: path.clone(),
            source,
        })?;

        let triples = parse_document(&document, DocumentFormat::from_path(&path))
            .map_err(|error| PdpError::Feed(format!("{}: {error}", path.display())))?;

        tracing::debug!(path = %path.display(), triples = triples.len(), "Read provenance document");
        Ok(Some(triples))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use provenance_graph::make_triple;

    use super::*;

    #[tokio::test]
    async fn it_reads_one_batch_per_document() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let lines = directory.path().join("lineage.nt");
        let json = directory.path().join("lineage.json");
        std::fs::write(&lines, "<doc1> <derivedFrom> <restrictedSource> .\n")?;
        std::fs::write(
            &json,
            r#"[{ "subject": "doc2", "predicate": "derivedFrom", "object": "doc1" }]"#,
        )?;

        let mut feed = DocumentFeed::new([lines, json]);

        assert_eq!(
            feed.next_batch().await?,
            Some(vec![make_triple("doc1", "derivedFrom", "restrictedSource")?])
        );
        assert_eq!(
            feed.next_batch().await?,
            Some(vec![make_triple("doc2", "derivedFrom", "doc1")?])
        );
        assert_eq!(feed.next_batch().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_broken_documents_and_moves_on() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let broken = directory.path().join("broken.nt");
        let good = directory.path().join("good.nt");
        std::fs::write(&broken, "<doc1> <derivedFrom> .\n")?;
        std::fs::write(&good, "<doc1> <derivedFrom> <doc0> .\n")?;

        let mut feed = DocumentFeed::new([directory.path().join("missing.nt"), broken, good]);

        assert!(matches!(feed.next_batch().await, Err(PdpError::Io { .. })));
        assert!(matches!(feed.next_batch().await, Err(PdpError::Feed(_))));
        assert_eq!(feed.next_batch().await?.map(|batch| batch.len()), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn it_keeps_a_document_whose_read_was_abandoned() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let lines = directory.path().join("lineage.nt");
        std::fs::write(&lines, "<doc1> <derivedFrom> <restrictedSource> .\n")?;

        let mut feed = DocumentFeed::new([lines]);

        // The file read runs on the blocking pool, so the first poll is
        // always pending and the zero timeout drops the future
        assert!(
            tokio::time::timeout(Duration::ZERO, feed.next_batch())
                .await
                .is_err()
        );
        assert_eq!(
            feed.next_batch().await?,
            Some(vec![make_triple("doc1", "derivedFrom", "restrictedSource")?])
        );
        assert_eq!(feed.next_batch().await?, None);
        Ok(())
    }
}
