use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClassifyError;

/// The append-only pool of labeled training texts.
///
/// Grows monotonically: samples are never rewritten or removed, only the
/// model built from them is. `texts` and `labels` stay index-aligned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplePool {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub count: usize,
}

impl SamplePool {
    pub fn append(&mut self, text: String, label: String) {
        self.texts.push(text);
        self.labels.push(label);
        self.count = self.texts.len();
        self.last_updated = Some(Utc::now());
    }

    pub fn distinct_labels(&self) -> usize {
        let mut labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }
}

/// Persistence handle for the sample pool: an explicit owned resource the
/// classifier is constructed with, not ambient shared state.
///
/// The pool file is a single-writer resource. Concurrent writers need
/// external mutual exclusion; this handle only guarantees that each write
/// is atomic (temp file + rename), so readers never observe a partial pool.
#[derive(Debug)]
pub struct SampleStore {
    path: PathBuf,
}

impl SampleStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pool. A missing file is an empty pool, not an error; a
    /// corrupt file degrades to an empty pool with a warning so a bad write
    /// from an older run cannot wedge classification.
    pub fn load(&self) -> SamplePool {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(pool) => pool,
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "sample_pool_corrupt");
                    SamplePool::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SamplePool::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "sample_pool_unreadable");
                SamplePool::default()
            }
        }
    }

    /// Replace the persisted pool atomically.
    pub fn atomic_replace(&self, pool: &SamplePool) -> Result<(), ClassifyError> {
        let json = serde_json::to_string(pool).map_err(|source| ClassifyError::Decode {
            what: format!("sample pool {}", self.path.display()),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| ClassifyError::Io {
            what: format!("sample pool {}", self.path.display()),
            source,
        };
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    /// Append one sample and persist immediately.
    pub fn append(
        &self,
        pool: &mut SamplePool,
        text: String,
        label: String,
    ) -> Result<(), ClassifyError> {
        pool.append(text, label);
        self.atomic_replace(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_texts_and_labels_aligned() {
        let mut pool = SamplePool::default();
        pool.append("不动产权证书".into(), "deed".into());
        pool.append("买卖合同".into(), "contract".into());
        assert_eq!(pool.count, 2);
        assert_eq!(pool.texts.len(), pool.labels.len());
        assert!(pool.last_updated.is_some());
        assert_eq!(pool.distinct_labels(), 2);
    }

    #[test]
    fn missing_file_loads_as_empty_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SampleStore::new(dir.path().join("samples.json"));
        let pool = store.load();
        assert_eq!(pool.count, 0);
    }

    #[test]
    fn corrupt_file_degrades_to_empty_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("samples.json");
        fs::write(&path, "{not json").expect("write");
        let store = SampleStore::new(&path);
        assert_eq!(store.load().count, 0);
    }

    #[test]
    fn pool_round_trips_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("samples.json");
        let store = SampleStore::new(&path);

        let mut pool = store.load();
        store
            .append(&mut pool, "不动产权证书".into(), "deed".into())
            .expect("append persists");

        let reopened = SampleStore::new(&path).load();
        assert_eq!(reopened.count, 1);
        assert_eq!(reopened.labels, vec!["deed".to_string()]);
    }
}
