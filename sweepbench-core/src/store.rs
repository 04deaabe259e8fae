//! Sample Store
//!
//! Maps each [`Coordinate`] to the raw samples gathered for it, one list per
//! result type. A coordinate mapped to `None` was evaluated and produced no
//! data; a coordinate absent from the store is still outstanding.
//!
//! Stores persist as JSON so a later invocation can resume where the previous
//! one stopped instead of re-running every trial.

use crate::coordinate::Coordinate;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Result type used when the program prints a bare `RESULT <n>` line
pub const DEFAULT_RESULT_TYPE: &str = "result";

/// Samples of one coordinate, keyed by result type
pub type RunResults = IndexMap<String, Vec<f64>>;

/// Errors from loading or saving a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed store file
    #[error("Invalid store file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coordinate → samples mapping, in insertion order
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    entries: IndexMap<Coordinate, Option<RunResults>>,
}

impl SampleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of `run`; `None` when absent or recorded as failed
    pub fn get(&self, run: &Coordinate) -> Option<&RunResults> {
        self.entries.get(run).and_then(Option::as_ref)
    }

    /// Whether `run` has been evaluated at all (including failures)
    pub fn contains(&self, run: &Coordinate) -> bool {
        self.entries.contains_key(run)
    }

    /// Record the outcome of `run`, replacing any previous entry
    pub fn insert(&mut self, run: Coordinate, results: Option<RunResults>) {
        self.entries.insert(run, results);
    }

    /// Append `results` to what is already stored for `run`.
    ///
    /// Existing samples are never dropped. A previous `None` entry is
    /// upgraded when new samples arrive.
    pub fn merge(&mut self, run: &Coordinate, results: RunResults) {
        if results.values().all(Vec::is_empty) {
            return;
        }
        let slot = self
            .entries
            .entry(run.clone())
            .or_insert(None)
            .get_or_insert_with(RunResults::new);
        for (result_type, samples) in results {
            slot.entry(result_type).or_default().extend(samples);
        }
    }

    /// Number of trials already recorded for `run`.
    ///
    /// Taken as the longest list across result types so that no list ever
    /// grows past the target.
    pub fn sample_count(&self, run: &Coordinate) -> usize {
        self.get(run)
            .map(|results| results.values().map(Vec::len).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Whether `run` already has at least `target` samples
    pub fn is_satisfied(&self, run: &Coordinate, target: usize) -> bool {
        self.get(run).is_some() && self.sample_count(run) >= target
    }

    /// Result types in first-seen order
    pub fn result_types(&self) -> IndexSet<String> {
        self.entries
            .values()
            .flatten()
            .flat_map(|results| results.keys().cloned())
            .collect()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, Option<&RunResults>)> {
        self.entries.iter().map(|(run, results)| (run, results.as_ref()))
    }

    /// Number of evaluated coordinates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been evaluated
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a store written by [`SampleStore::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let stored: StoredStore = serde_json::from_str(&content)?;
        let mut store = SampleStore::new();
        for entry in stored.entries {
            store.insert(entry.run, entry.results);
        }
        Ok(store)
    }

    /// Load `path` if it exists, otherwise start empty.
    ///
    /// A corrupt file is reported and ignored; the next save overwrites it.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return SampleStore::new();
        }
        match Self::load(path) {
            Ok(store) => {
                tracing::debug!("Loaded {} cached runs from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                tracing::warn!("Ignoring result cache {}: {}", path.display(), e);
                SampleStore::new()
            }
        }
    }

    /// Persist the store as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>, test: &str, build: &str) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredStore {
            test: test.to_string(),
            build: build.to_string(),
            saved_at: Utc::now(),
            entries: self
                .entries
                .iter()
                .map(|(run, results)| StoredEntry {
                    run: run.clone(),
                    results: results.clone(),
                })
                .collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}

/// On-disk layout of a store
#[derive(Debug, Serialize, Deserialize)]
struct StoredStore {
    test: String,
    build: String,
    saved_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    run: Coordinate,
    results: Option<RunResults>,
}
