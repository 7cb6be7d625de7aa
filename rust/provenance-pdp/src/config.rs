use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::PdpError;

fn default_workers() -> usize {
    1024
}

fn default_queue_limit() -> usize {
    4096
}

fn default_decision_timeout_ms() -> u64 {
    250
}

fn default_capacity() -> usize {
    10_000_000
}

fn default_ingest_interval_ms() -> u64 {
    1000
}

/// Configuration of a [`crate::PolicyDecisionPoint`] and the `pdp` binary,
/// read from a TOML file:
///
/// ```toml
/// workers = 64
/// decision_timeout_ms = 100
/// policy = "policy.json"
/// provenance = ["lineage.nt"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdpConfig {
    /// Decisions that may evaluate at the same time
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Decisions that may wait for a worker before new ones are turned away
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,

    /// How long one decision may spend evaluating
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// The most triples the provenance graph may hold
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Minimum pause between two ingestion batches
    #[serde(default = "default_ingest_interval_ms")]
    pub ingest_interval_ms: u64,

    /// A JSON rule set document
    #[serde(default)]
    pub policy: Option<PathBuf>,

    /// A JSON document of subject and target attributes
    #[serde(default)]
    pub attributes: Option<PathBuf>,

    /// A JSON vocabulary that rules are checked against
    #[serde(default)]
    pub vocabulary: Option<PathBuf>,

    /// Provenance documents to ingest, JSON or line-based
    #[serde(default)]
    pub provenance: Vec<PathBuf>,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_limit: default_queue_limit(),
            decision_timeout_ms: default_decision_timeout_ms(),
            capacity: default_capacity(),
            ingest_interval_ms: default_ingest_interval_ms(),
            policy: None,
            attributes: None,
            vocabulary: None,
            provenance: Vec::new(),
        }
    }
}

impl PdpConfig {
    /// Load configuration from a TOML file. If the file does not exist, the
    /// defaults are returned. Relative paths in the file are resolved
    /// against the directory that holds it.
    pub fn load(path: &Path) -> Result<Self, PdpError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| PdpError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: PdpConfig = toml::from_str(&contents)?;
        config.validate()?;

        Ok(match path.parent() {
            Some(base) => config.relative_to(base),
            None => config,
        })
    }

    /// Check that the values can run a decision point
    pub fn validate(&self) -> Result<(), PdpError> {
        if self.workers == 0 {
            return Err(PdpError::Config("workers must be > 0".into()));
        }
        if self.decision_timeout_ms == 0 {
            return Err(PdpError::Config("decision_timeout_ms must be > 0".into()));
        }
        if self.capacity == 0 {
            return Err(PdpError::Config("capacity must be > 0".into()));
        }
        Ok(())
    }

    /// The evaluation budget of one decision
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    /// The minimum pause between ingestion batches
    pub fn ingest_interval(&self) -> Duration {
        Duration::from_millis(self.ingest_interval_ms)
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: PathBuf| base.join(path);

        self.policy = self.policy.map(resolve);
        self.attributes = self.attributes.map(resolve);
        self.vocabulary = self.vocabulary.map(resolve);
        self.provenance = self.provenance.into_iter().map(resolve).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn it_returns_defaults_when_the_file_is_missing() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let config = PdpConfig::load(&directory.path().join("pdp.toml"))?;

        assert_eq!(config, PdpConfig::default());
        assert_eq!(config.workers, 1024);
        assert_eq!(config.decision_timeout(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn it_resolves_paths_next_to_the_config_file() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("pdp.toml");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "workers = 8")?;
        writeln!(file, "policy = \"policy.json\"")?;
        writeln!(file, "provenance = [\"a.nt\", \"/var/lib/b.json\"]")?;

        let config = PdpConfig::load(&path)?;

        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_limit, 4096);
        assert_eq!(config.policy, Some(directory.path().join("policy.json")));
        assert_eq!(
            config.provenance,
            vec![
                directory.path().join("a.nt"),
                PathBuf::from("/var/lib/b.json")
            ]
        );
        Ok(())
    }

    #[test]
    fn it_rejects_unusable_values() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("pdp.toml");

        std::fs::write(&path, "workers = 0\n")?;
        assert!(matches!(PdpConfig::load(&path), Err(PdpError::Config(_))));

        std::fs::write(&path, "decision_timeout_ms = 0\n")?;
        assert!(matches!(PdpConfig::load(&path), Err(PdpError::Config(_))));

        std::fs::write(&path, "workerz = 3\n")?;
        assert!(matches!(PdpConfig::load(&path), Err(PdpError::Toml(_))));
        Ok(())
    }
}
