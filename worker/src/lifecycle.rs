//! Worker Lifecycle Management
//!
//! State transitions plus the two lifecycle steps that touch storage:
//! precaching at install time and pruning stale buckets at activation.

use tokio::sync::watch;

use crate::cache::CacheHandle;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::fetch::Request;
use crate::network::Network;

/// Worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceWorkerState {
    /// Created, install not started
    #[default]
    Parsed,
    /// Install step running
    Installing,
    /// Installed, waiting to activate
    Installed,
    /// Activate step running
    Activating,
    /// Active and controlling pages
    Activated,
    /// Replaced or failed
    Redundant,
}

/// Lifecycle event records, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// State change
    StateChange {
        old_state: ServiceWorkerState,
        new_state: ServiceWorkerState,
    },
    /// Stale buckets removed during activation
    BucketsPruned(Vec<String>),
    /// Worker started controlling clients
    ControllerChange,
}

/// Lifecycle state machine for one worker
pub struct Lifecycle {
    /// Current state, observable by the registration
    state: watch::Sender<ServiceWorkerState>,
    /// Everything that happened, in order
    events: Vec<LifecycleEvent>,
    /// Whether clients have been claimed
    claimed: bool,
}

impl Lifecycle {
    /// Create a lifecycle in the `Parsed` state
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServiceWorkerState::Parsed);
        Self {
            state,
            events: Vec::new(),
            claimed: false,
        }
    }

    /// Current state
    pub fn state(&self) -> ServiceWorkerState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ServiceWorkerState> {
        self.state.subscribe()
    }

    /// Recorded events
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    /// Whether fetches are being intercepted
    pub fn is_controlling(&self) -> bool {
        self.claimed && self.state() == ServiceWorkerState::Activated
    }

    /// Transition worker state
    pub fn transition(&mut self, new_state: ServiceWorkerState) -> Result<(), WorkerError> {
        let old_state = self.state();

        if !is_valid_transition(old_state, new_state) {
            return Err(WorkerError::InvalidStateTransition {
                from: old_state,
                to: new_state,
            });
        }

        self.state.send_replace(new_state);
        self.events.push(LifecycleEvent::StateChange {
            old_state,
            new_state,
        });
        log::debug!("worker state {:?} -> {:?}", old_state, new_state);
        Ok(())
    }

    /// Record pruned buckets
    pub fn record_pruned(&mut self, names: Vec<String>) {
        self.events.push(LifecycleEvent::BucketsPruned(names));
    }

    /// Claim clients (take control of all pages in scope)
    pub fn claim(&mut self) -> Result<(), WorkerError> {
        let state = self.state();
        if state != ServiceWorkerState::Activated {
            return Err(WorkerError::InvalidStateTransition {
                from: state,
                to: ServiceWorkerState::Activated,
            });
        }
        self.claimed = true;
        self.events.push(LifecycleEvent::ControllerChange);
        Ok(())
    }

    /// Mark the worker as replaced
    pub fn retire(&mut self) {
        let old_state = self.state();
        if old_state != ServiceWorkerState::Redundant {
            self.claimed = false;
            self.state.send_replace(ServiceWorkerState::Redundant);
            self.events.push(LifecycleEvent::StateChange {
                old_state,
                new_state: ServiceWorkerState::Redundant,
            });
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: ServiceWorkerState, to: ServiceWorkerState) -> bool {
    use ServiceWorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Installed)
            | (Installing, Redundant)
            | (Installed, Activating)
            | (Installed, Redundant)
            | (Activating, Activated)
            | (Activating, Redundant)
            | (Activated, Redundant)
    )
}

/// Fetch every precache entry and store them in the static bucket.
///
/// All-or-nothing: if any entry fails to fetch or is not a success
/// response, nothing is stored.
pub async fn precache(
    config: &WorkerConfig,
    caches: &CacheHandle,
    network: &dyn Network,
) -> Result<usize, WorkerError> {
    let bucket = config.static_bucket();
    caches.open(&bucket);

    let mut fetched = Vec::new();
    for url in config.precache_urls() {
        let request = Request::get(&url);
        let response = network
            .fetch(&request)
            .await
            .map_err(|e| WorkerError::PrecacheFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.ok() {
            return Err(WorkerError::PrecacheFailed {
                url,
                reason: format!("status {}", response.status),
            });
        }
        fetched.push((request, response));
    }

    let count = fetched.len();
    caches.put_all(&bucket, fetched);
    Ok(count)
}

/// Delete every bucket that does not belong to the current version.
///
/// Later runtime writes from older workers into their own buckets are
/// dropped.
pub fn prune_stale_buckets(config: &WorkerConfig, caches: &CacheHandle) -> Vec<String> {
    let keep = [config.static_bucket(), config.runtime_bucket()];
    let deleted = caches.retain_only(&keep);
    for name in &deleted {
        log::info!("deleted old cache {}", name);
    }
    deleted
}
