//! Persistence of finished records.
//!
//! The pipeline talks to storage only through [`Persistence`]. [`FileStore`]
//! keeps everything in memory behind a tokio mutex and, when opened with a
//! path, rewrites a single JSON document after every mutation.
//!
//! # On-disk layout
//!
//! ```text
//! {
//!   "nextId": 3,
//!   "categories": { "News": 1 },
//!   "records": [ { "id": 1, "title": ..., "contentHash": ..., ... } ]
//! }
//! ```

use crate::error::PersistenceError;
use crate::models::FinishedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// A persisted record and its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub record: FinishedRecord,
}

/// Storage boundary used by the deduplicator and the orchestrator.
///
/// `save` must be atomic per fingerprint: when two imports race on the same
/// item exactly one of them gets an id and the other gets
/// [`PersistenceError::Conflict`].
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn exists_by_fingerprint(&self, hash: &str) -> Result<bool, PersistenceError>;

    async fn save(&self, record: &FinishedRecord) -> Result<u64, PersistenceError>;

    /// Id of the category called `name` (case-insensitive), created on first use.
    async fn create_category_if_missing(&self, name: &str) -> Result<u64, PersistenceError>;

    /// Up to `limit` records without an image whose id is greater than `after_id`, by id.
    async fn records_without_image(&self, after_id: u64, limit: usize) -> Result<Vec<StoredRecord>, PersistenceError>;

    async fn set_image(&self, id: u64, url: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    next_id: u64,
    categories: BTreeMap<String, u64>,
    records: Vec<StoredRecord>,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// JSON-file backed [`Persistence`].
pub struct FileStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Open the store at `path`, starting empty if the file does not exist yet.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        let state = match fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str::<StoreState>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        info!(records = state.records.len(), categories = state.categories.len(), "Opened record store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        })
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    /// Snapshot of every stored record.
    #[cfg(test)]
    pub async fn records(&self) -> Vec<StoredRecord> {
        self.state.lock().await.records.clone()
    }

    async fn flush(&self, state: &StoreState) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), records = state.records.len(), "Flushed record store");
        Ok(())
    }
}

#[async_trait]
impl Persistence for FileStore {
    async fn exists_by_fingerprint(&self, hash: &str) -> Result<bool, PersistenceError> {
        let state = self.state.lock().await;
        Ok(state.records.iter().any(|r| r.record.content_hash == hash))
    }

    async fn save(&self, record: &FinishedRecord) -> Result<u64, PersistenceError> {
        let mut state = self.state.lock().await;
        if state.records.iter().any(|r| r.record.content_hash == record.content_hash) {
            return Err(PersistenceError::Conflict(record.content_hash.clone()));
        }
        let id = state.allocate_id();
        state.records.push(StoredRecord {
            id,
            record: record.clone(),
        });
        if let Err(e) = self.flush(&state).await {
            state.records.pop();
            return Err(e);
        }
        Ok(id)
    }

    async fn create_category_if_missing(&self, name: &str) -> Result<u64, PersistenceError> {
        let name = name.trim();
        let mut state = self.state.lock().await;
        if let Some(id) = state
            .categories
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
        {
            return Ok(id);
        }
        let id = state.allocate_id();
        state.categories.insert(name.to_string(), id);
        if let Err(e) = self.flush(&state).await {
            state.categories.remove(name);
            return Err(e);
        }
        info!(category = %name, id, "Created category");
        Ok(id)
    }

    async fn records_without_image(&self, after_id: u64, limit: usize) -> Result<Vec<StoredRecord>, PersistenceError> {
        let state = self.state.lock().await;
        let mut out: Vec<StoredRecord> = state
            .records
            .iter()
            .filter(|r| r.id > after_id && r.record.item.image.as_deref().is_none_or(str::is_empty))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        out.truncate(limit);
        Ok(out)
    }

    async fn set_image(&self, id: u64, url: &str) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(PersistenceError::NotFound(id))?;
        let previous = record.record.item.image.replace(url.to_string());
        if let Err(e) = self.flush(&state).await {
            if let Some(record) = state.records.iter_mut().find(|r| r.id == id) {
                record.record.item.image = previous;
            }
            return Err(e);
        }
        Ok(())
    }
}
