//! Worker Registration
//!
//! Page-side view of the workers registered for one scope: the worker
//! currently controlling pages and, when a new version is installed but
//! not yet activated, the one waiting behind it.

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::lifecycle::ServiceWorkerState;
use crate::message::{ControlMessage, VersionReply};
use crate::worker::{OfflineWorker, WorkerContext, WorkerHandle};

/// Update state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateState {
    /// No update pending
    #[default]
    None,
    /// A new worker is installing
    Checking,
    /// A new worker is installed and waiting
    Available,
}

/// A registration and the workers it holds
pub struct Registration {
    /// The scope (origin) the workers control
    scope: String,
    /// Shared resources handed to every worker
    ctx: WorkerContext,
    update_state: UpdateState,
    /// Waiting worker (if any)
    waiting: Option<WorkerHandle>,
    /// Active worker (if any)
    active: Option<WorkerHandle>,
}

impl Registration {
    /// Create an empty registration
    pub fn new(scope: impl Into<String>, ctx: WorkerContext) -> Self {
        Self {
            scope: scope.into(),
            ctx,
            update_state: UpdateState::None,
            waiting: None,
            active: None,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn update_state(&self) -> UpdateState {
        self.update_state
    }

    /// Worker controlling pages
    pub fn active(&self) -> Option<&WorkerHandle> {
        self.active.as_ref()
    }

    /// Worker installed behind the active one
    pub fn waiting(&self) -> Option<&WorkerHandle> {
        self.waiting.as_ref()
    }

    /// Whether a new version is waiting to take over
    pub fn update_available(&self) -> bool {
        self.update_state == UpdateState::Available
    }

    /// Start and install a worker for `config`.
    ///
    /// A worker that activates replaces the active one. One that stays
    /// installed becomes the waiting worker, unless nothing is active, in
    /// which case it is activated directly.
    pub async fn register(&mut self, config: WorkerConfig) -> Result<ServiceWorkerState, WorkerError> {
        self.update_state = UpdateState::Checking;
        let worker = OfflineWorker::spawn(config, self.ctx.clone());
        let state = match worker.install().await {
            Ok(state) => state,
            Err(err) => {
                self.update_state = UpdateState::None;
                worker.terminate();
                return Err(err);
            }
        };

        match state {
            ServiceWorkerState::Activated => {
                self.promote(worker);
                Ok(state)
            }
            ServiceWorkerState::Installed if self.active.is_none() => {
                log::info!("activating worker {} directly", worker.id().raw());
                worker.activate().await?;
                self.promote(worker);
                Ok(ServiceWorkerState::Activated)
            }
            ServiceWorkerState::Installed => {
                log::info!("worker {} waiting", worker.id().raw());
                if let Some(previous) = self.waiting.replace(worker) {
                    previous.terminate();
                }
                self.update_state = UpdateState::Available;
                Ok(state)
            }
            other => {
                self.update_state = UpdateState::None;
                worker.terminate();
                Err(WorkerError::InvalidStateTransition {
                    from: other,
                    to: ServiceWorkerState::Installed,
                })
            }
        }
    }

    /// Tell the waiting worker to skip waiting and wait until it has taken
    /// over. Returns `false` when nothing was waiting.
    pub async fn apply_update(&mut self) -> Result<bool, WorkerError> {
        let Some(waiting) = self.waiting.take() else {
            return Ok(false);
        };
        waiting.post_message(ControlMessage::SkipWaiting.to_value())?;
        let mut state = waiting.subscribe();
        let reached = state
            .wait_for(|s| matches!(s, ServiceWorkerState::Activated | ServiceWorkerState::Redundant))
            .await
            .map(|s| *s)
            .map_err(|_| WorkerError::WorkerGone)?;
        if reached != ServiceWorkerState::Activated {
            self.update_state = UpdateState::None;
            return Err(WorkerError::WorkerGone);
        }
        self.promote(waiting);
        Ok(true)
    }

    /// Ask the controlling worker for its cache version
    pub async fn version(&self) -> Result<Option<VersionReply>, WorkerError> {
        match &self.active {
            Some(active) => active.request(ControlMessage::GetVersion.to_value()).await,
            None => Ok(None),
        }
    }

    /// Drop every worker
    pub fn unregister(&mut self) {
        for worker in self.waiting.take().into_iter().chain(self.active.take()) {
            worker.terminate();
        }
        self.update_state = UpdateState::None;
    }

    fn promote(&mut self, worker: WorkerHandle) {
        if let Some(previous) = self.active.replace(worker) {
            log::info!("worker {} replaced", previous.id().raw());
            previous.terminate();
        }
        if let Some(stale) = self.waiting.take() {
            stale.terminate();
        }
        self.update_state = UpdateState::None;
    }
}
