//! Background Sync
//!
//! Tag registrations that fire when connectivity is available, retried
//! with back-off when the work they trigger fails, plus the drain that
//! ships the offline action queue to the server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{StoreError, WorkerError};
use crate::fetch::Request;
use crate::network::Network;
use crate::outbox::ActionQueue;

/// Sync event ID counter
static NEXT_SYNC_ID: AtomicU64 = AtomicU64::new(1);

/// Sync registration ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(u64);

impl SyncId {
    fn new() -> Self {
        Self(NEXT_SYNC_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// Connectivity as seen by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkState {
    #[default]
    Online,
    Offline,
}

/// Sync registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Waiting for connectivity
    #[default]
    Pending,
    /// Sync work in progress
    Firing,
    /// Failed, waiting for the retry timer
    Reregistering,
    /// Completed successfully
    Success,
    /// Gave up after the last chance
    Failed,
}

/// Sync registration
#[derive(Debug, Clone)]
pub struct SyncRegistration {
    /// Registration ID
    id: SyncId,
    /// Tag (unique identifier within the worker)
    tag: String,
    /// Current state
    state: SyncState,
    /// Failed attempts so far
    retry_count: u32,
    /// Failures allowed before the last chance
    max_retries: u32,
    /// Whether the next attempt is the final one
    last_chance: bool,
    /// Milliseconds since the epoch
    created_at: i64,
    /// Milliseconds since the epoch
    last_fired_at: Option<i64>,
}

impl SyncRegistration {
    /// Create new registration
    pub fn new(tag: impl Into<String>, max_retries: u32) -> Self {
        Self {
            id: SyncId::new(),
            tag: tag.into(),
            state: SyncState::Pending,
            retry_count: 0,
            max_retries,
            last_chance: false,
            created_at: chrono::Utc::now().timestamp_millis(),
            last_fired_at: None,
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Check if this is the last chance
    pub fn last_chance(&self) -> bool {
        self.last_chance
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn last_fired_at(&self) -> Option<i64> {
        self.last_fired_at
    }

    /// Mark as firing
    pub fn mark_firing(&mut self) {
        self.state = SyncState::Firing;
        self.last_fired_at = Some(chrono::Utc::now().timestamp_millis());
    }

    /// Mark as success
    pub fn mark_success(&mut self) {
        self.state = SyncState::Success;
    }

    /// Record a failure. Returns `false` once the registration is on its
    /// last chance.
    pub fn mark_failed(&mut self) -> bool {
        self.retry_count += 1;
        self.state = SyncState::Reregistering;
        if self.retry_count >= self.max_retries {
            self.last_chance = true;
            false
        } else {
            true
        }
    }

    /// Mark as permanently failed
    pub fn mark_permanently_failed(&mut self) {
        self.state = SyncState::Failed;
    }

    /// Make a reregistering registration eligible to fire again
    fn rearm(&mut self) -> bool {
        if self.state == SyncState::Reregistering {
            self.state = SyncState::Pending;
            true
        } else {
            false
        }
    }
}

/// Sync event handed to the drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    /// Registration tag
    pub tag: String,
    /// Whether this is the last chance
    pub last_chance: bool,
}

impl SyncEvent {
    pub fn new(tag: impl Into<String>, last_chance: bool) -> Self {
        Self {
            tag: tag.into(),
            last_chance,
        }
    }
}

/// What happened to a registration after its sync work finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Done; the registration was removed
    Completed,
    /// Failed; retry number `attempt` should be scheduled
    Retry { attempt: u32 },
    /// Failed on the last chance; the registration was removed
    Abandoned,
}

/// Sync manager for a worker
pub struct SyncManager {
    /// Registrations by tag
    registrations: BTreeMap<String, SyncRegistration>,
    /// Failures allowed before the last chance
    max_retries: u32,
    /// Connectivity as last reported
    network: NetworkState,
}

impl SyncManager {
    /// Create new sync manager
    pub fn new(max_retries: u32) -> Self {
        Self {
            registrations: BTreeMap::new(),
            max_retries,
            network: NetworkState::Online,
        }
    }

    /// Register a sync. Registering a tag that already exists returns
    /// the existing registration.
    pub fn register(&mut self, tag: impl Into<String>) -> SyncId {
        let tag = tag.into();
        if let Some(existing) = self.registrations.get(&tag) {
            return existing.id();
        }

        let registration = SyncRegistration::new(tag.clone(), self.max_retries);
        let id = registration.id();
        self.registrations.insert(tag, registration);
        id
    }

    /// Get a registration by tag
    pub fn get(&self, tag: &str) -> Option<&SyncRegistration> {
        self.registrations.get(tag)
    }

    /// Get all tags
    pub fn get_tags(&self) -> Vec<String> {
        self.registrations.keys().cloned().collect()
    }

    /// Unregister a sync
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.registrations.remove(tag).is_some()
    }

    pub fn network_state(&self) -> NetworkState {
        self.network
    }

    /// Record connectivity. Coming back online re-arms every registration
    /// waiting on a retry timer. Returns `true` on an offline → online edge.
    pub fn set_network_state(&mut self, state: NetworkState) -> bool {
        let came_online = self.network == NetworkState::Offline && state == NetworkState::Online;
        self.network = state;
        if came_online {
            for registration in self.registrations.values_mut() {
                registration.rearm();
            }
        }
        came_online
    }

    /// Retry timer for `tag` elapsed
    pub fn rearm(&mut self, tag: &str) -> bool {
        self.registrations
            .get_mut(tag)
            .map(|r| r.rearm())
            .unwrap_or(false)
    }

    /// Fire pending syncs. Nothing fires while offline.
    pub fn fire_ready(&mut self) -> Vec<SyncEvent> {
        if self.network == NetworkState::Offline {
            return Vec::new();
        }

        let mut events = Vec::new();
        for registration in self.registrations.values_mut() {
            if registration.state == SyncState::Pending {
                registration.mark_firing();
                events.push(SyncEvent::new(
                    registration.tag.clone(),
                    registration.last_chance,
                ));
            }
        }
        events
    }

    /// Complete a sync. Returns `None` for an unknown tag.
    pub fn complete(&mut self, tag: &str, success: bool) -> Option<SyncOutcome> {
        let registration = self.registrations.get_mut(tag)?;
        if success {
            registration.mark_success();
            self.registrations.remove(tag);
            return Some(SyncOutcome::Completed);
        }
        if registration.last_chance {
            registration.mark_permanently_failed();
            self.registrations.remove(tag);
            return Some(SyncOutcome::Abandoned);
        }
        registration.mark_failed();
        Some(SyncOutcome::Retry {
            attempt: registration.retry_count,
        })
    }
}

/// POST every claimable queue entry to `endpoint` as one JSON array.
///
/// Returns the number of entries synced. On failure the claimed entries
/// go back to `failed-retry`.
pub async fn drain_queue(
    queue: &ActionQueue,
    network: &dyn Network,
    endpoint: &str,
) -> Result<usize, WorkerError> {
    let claimed = queue.claim_for_sync()?;
    if claimed.is_empty() {
        return Ok(0);
    }
    let ids: Vec<u64> = claimed.iter().map(|e| e.id).collect();
    let body = serde_json::to_vec(&claimed).map_err(StoreError::from)?;
    let request = Request::post(endpoint, body).with_header("content-type", "application/json");

    let reason = match network.fetch(&request).await {
        Ok(response) if response.ok() => {
            queue.mark_synced(&ids)?;
            log::info!("synced {} offline actions", ids.len());
            return Ok(ids.len());
        }
        Ok(response) => format!("status {}", response.status),
        Err(err) => err.to_string(),
    };

    queue.mark_failed(&ids, &reason)?;
    Err(WorkerError::SyncFailed {
        endpoint: endpoint.to_string(),
        reason,
    })
}
