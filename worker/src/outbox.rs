//! Durable Action Queue
//!
//! Cart actions taken while offline are appended here by the page and
//! drained by the worker's background sync. Every mutation is written
//! through to an [`ActionStore`] so that a restart does not lose
//! anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// What the user did while offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Item added to the cart
    Add,
}

/// Sync status of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    /// Not yet sent
    #[default]
    Pending,
    /// Claimed by a drain in progress
    Syncing,
    /// A previous drain failed; will be sent again
    FailedRetry,
}

/// One queued offline action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Queue-local ID
    pub id: u64,
    /// Action kind
    pub action: ActionKind,
    /// Snapshot of the catalog item, opaque to the worker
    pub item: serde_json::Value,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Where queue contents are persisted.
pub trait ActionStore: Send + Sync {
    /// Read every stored entry. An empty store yields an empty list.
    fn load(&self) -> Result<Vec<PendingAction>, StoreError>;

    /// Replace the stored entries.
    fn save(&self, entries: &[PendingAction]) -> Result<(), StoreError>;
}

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: spin::Mutex<Vec<PendingAction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries, as if they had been persisted earlier.
    pub fn with_entries(entries: Vec<PendingAction>) -> Self {
        Self {
            entries: spin::Mutex::new(entries),
        }
    }
}

impl ActionStore for MemoryStore {
    fn load(&self) -> Result<Vec<PendingAction>, StoreError> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, entries: &[PendingAction]) -> Result<(), StoreError> {
        *self.entries.lock() = entries.to_vec();
        Ok(())
    }
}

/// Store backed by a JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ActionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<PendingAction>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes to a sibling temp file, then renames over the target.
    fn save(&self, entries: &[PendingAction]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(dir, e))?;
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&tmp_path, json).map_err(|e| self.io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(&self.path, e))?;
        Ok(())
    }
}

struct QueueState {
    entries: Vec<PendingAction>,
    next_id: u64,
}

/// Shared handle to the action queue. Clones refer to the same queue.
///
/// Every mutation builds the next entry list, saves it, and only then
/// replaces the in-memory list, so a failed save leaves the queue as it
/// was. The state lock is a blocking mutex because it is held across the
/// store write; it is never held across an await.
#[derive(Clone)]
pub struct ActionQueue {
    state: Arc<Mutex<QueueState>>,
    store: Arc<dyn ActionStore>,
}

impl ActionQueue {
    /// Open a queue over `store`, loading whatever it holds.
    ///
    /// Entries left in `syncing` by an interrupted drain are moved back to
    /// `failed-retry`.
    pub fn open(store: Arc<dyn ActionStore>) -> Result<Self, StoreError> {
        let mut entries = store.load()?;
        let mut recovered = 0;
        for entry in entries.iter_mut().filter(|e| e.status == ActionStatus::Syncing) {
            entry.status = ActionStatus::FailedRetry;
            recovered += 1;
        }
        if recovered > 0 {
            log::warn!("recovered {} actions from an interrupted sync", recovered);
            store.save(&entries)?;
        }
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        Ok(Self {
            state: Arc::new(Mutex::new(QueueState { entries, next_id })),
            store,
        })
    }

    /// Queue backed by a [`MemoryStore`]
    pub fn in_memory() -> Self {
        let state = QueueState {
            entries: Vec::new(),
            next_id: 1,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save `entries` and make them the queue's contents.
    fn commit(
        &self,
        state: &mut QueueState,
        entries: Vec<PendingAction>,
    ) -> Result<(), StoreError> {
        self.store.save(&entries)?;
        state.entries = entries;
        Ok(())
    }

    /// Append an action; returns its ID.
    pub fn enqueue(&self, action: ActionKind, item: serde_json::Value) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let id = state.next_id;
        let mut entries = state.entries.clone();
        entries.push(PendingAction {
            id,
            action,
            item,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: ActionStatus::Pending,
            attempts: 0,
            last_error: None,
        });
        self.commit(&mut state, entries)?;
        state.next_id += 1;
        log::debug!("queued offline action {}", id);
        Ok(id)
    }

    /// Snapshot of every entry, in insertion order
    pub fn entries(&self) -> Vec<PendingAction> {
        self.lock().entries.clone()
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Whether any entry is waiting to be claimed by a drain
    pub fn has_claimable(&self) -> bool {
        self.lock()
            .entries
            .iter()
            .any(|e| e.status != ActionStatus::Syncing)
    }

    /// Mark every `pending`/`failed-retry` entry as `syncing` and return
    /// them. Entries already being synced are not claimed twice.
    pub fn claim_for_sync(&self) -> Result<Vec<PendingAction>, StoreError> {
        let mut state = self.lock();
        let mut entries = state.entries.clone();
        let mut claimed = Vec::new();
        for entry in entries
            .iter_mut()
            .filter(|e| e.status != ActionStatus::Syncing)
        {
            entry.status = ActionStatus::Syncing;
            claimed.push(entry.clone());
        }
        if !claimed.is_empty() {
            self.commit(&mut state, entries)?;
        }
        Ok(claimed)
    }

    /// Remove entries the server accepted.
    pub fn mark_synced(&self, ids: &[u64]) -> Result<(), StoreError> {
        let mut state = self.lock();
        let entries = state
            .entries
            .iter()
            .filter(|e| !ids.contains(&e.id))
            .cloned()
            .collect();
        self.commit(&mut state, entries)
    }

    /// Return claimed entries to `failed-retry` after a failed drain.
    pub fn mark_failed(&self, ids: &[u64], error: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut entries = state.entries.clone();
        for entry in entries.iter_mut().filter(|e| ids.contains(&e.id)) {
            entry.status = ActionStatus::FailedRetry;
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
        }
        self.commit(&mut state, entries)
    }
}
