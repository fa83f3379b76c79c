//! Worker Task
//!
//! One tokio task per worker. Lifecycle, sync, push and control messages
//! are processed in order by that task; every intercepted fetch gets its
//! own spawned task so slow network round trips never block the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::cache::CacheHandle;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::fetch::Request;
use crate::intercept::{FetchEvent, FetchResult, Interceptor};
use crate::lifecycle::{self, Lifecycle, ServiceWorkerState};
use crate::message::{ControlMessage, VersionReply};
use crate::network::Network;
use crate::outbox::ActionQueue;
use crate::push::{self, ClickOutcome, Notification, PushMessage};
use crate::sync::{self as bgsync, NetworkState, SyncId, SyncManager, SyncOutcome};

/// Worker ID counter
static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Worker ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    fn new() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Messages from a worker to the pages it controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Display a notification
    ShowNotification(Notification),
    /// Open (or focus) a window at this path
    OpenWindow(String),
    /// This worker started controlling pages
    ControllerChanged(WorkerId),
    /// A sync drain finished
    SyncCompleted { tag: String, synced: usize },
    /// A sync drain failed; `retry_in` is `None` once the registration
    /// has been abandoned
    SyncFailed {
        tag: String,
        reason: String,
        retry_in: Option<Duration>,
    },
}

enum WorkerEvent {
    Install {
        reply: oneshot::Sender<Result<ServiceWorkerState, WorkerError>>,
    },
    Activate {
        reply: oneshot::Sender<Result<(), WorkerError>>,
    },
    Fetch {
        event: FetchEvent,
        reply: oneshot::Sender<FetchResult>,
    },
    Message {
        payload: serde_json::Value,
        reply: Option<oneshot::Sender<VersionReply>>,
    },
    Connectivity(NetworkState),
    SyncRegister {
        tag: String,
        reply: oneshot::Sender<SyncId>,
    },
    SyncRetry {
        tag: String,
    },
    SyncDone {
        tag: String,
        result: Result<usize, String>,
    },
    Push(PushMessage),
    NotificationClick {
        action: Option<String>,
    },
    Terminate,
}

/// Everything a worker needs from its environment
#[derive(Clone)]
pub struct WorkerContext {
    /// Bucket store shared by every worker of the origin
    pub caches: CacheHandle,
    pub network: Arc<dyn Network>,
    /// Durable queue shared with the page
    pub queue: ActionQueue,
    /// Where notifications and window requests go
    pub clients: mpsc::UnboundedSender<ClientCommand>,
}

/// Handle to a running worker. Cheap to clone.
#[derive(Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    version: String,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    state: watch::Receiver<ServiceWorkerState>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Cache version this worker was built with
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceWorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<ServiceWorkerState> {
        self.state.clone()
    }

    fn send(&self, event: WorkerEvent) -> Result<(), WorkerError> {
        self.tx.send(event).map_err(|_| WorkerError::WorkerGone)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> WorkerEvent,
    ) -> Result<T, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| WorkerError::WorkerGone)
    }

    /// Run the install step. Returns the state reached: `Activated` when
    /// install succeeded and the worker skips waiting, otherwise
    /// `Installed`.
    pub async fn install(&self) -> Result<ServiceWorkerState, WorkerError> {
        self.call(|reply| WorkerEvent::Install { reply }).await?
    }

    /// Activate an installed worker directly
    pub async fn activate(&self) -> Result<(), WorkerError> {
        self.call(|reply| WorkerEvent::Activate { reply }).await?
    }

    /// Dispatch a fetch through the worker
    pub async fn fetch(&self, request: Request) -> Result<FetchResult, WorkerError> {
        let event = FetchEvent::new(request);
        self.call(|reply| WorkerEvent::Fetch { event, reply }).await
    }

    /// Post a control message without waiting for a reply
    pub fn post_message(&self, payload: serde_json::Value) -> Result<(), WorkerError> {
        self.send(WorkerEvent::Message {
            payload,
            reply: None,
        })
    }

    /// Post a control message with a reply channel. `None` means the
    /// message produced no reply.
    pub async fn request(
        &self,
        payload: serde_json::Value,
    ) -> Result<Option<VersionReply>, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerEvent::Message {
            payload,
            reply: Some(reply),
        })?;
        Ok(rx.await.ok())
    }

    /// Report connectivity to the worker
    pub fn set_network_state(&self, state: NetworkState) -> Result<(), WorkerError> {
        self.send(WorkerEvent::Connectivity(state))
    }

    /// Register a background sync tag
    pub async fn register_sync(&self, tag: &str) -> Result<SyncId, WorkerError> {
        let tag = tag.to_string();
        self.call(|reply| WorkerEvent::SyncRegister { tag, reply })
            .await
    }

    /// Deliver a push message
    pub fn push(&self, message: PushMessage) -> Result<(), WorkerError> {
        self.send(WorkerEvent::Push(message))
    }

    /// Deliver a notification click
    pub fn notification_click(&self, action: Option<&str>) -> Result<(), WorkerError> {
        self.send(WorkerEvent::NotificationClick {
            action: action.map(str::to_string),
        })
    }

    /// Make the worker redundant and stop its task
    pub fn terminate(&self) {
        // a worker that already stopped is already redundant
        let _ = self.tx.send(WorkerEvent::Terminate);
    }
}

/// The worker task state
pub struct OfflineWorker {
    id: WorkerId,
    config: Arc<WorkerConfig>,
    ctx: WorkerContext,
    lifecycle: Lifecycle,
    sync: SyncManager,
    interceptor: Interceptor,
    /// Loopback for timers and drain tasks
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl OfflineWorker {
    /// Start a worker task in the `Parsed` state. Must be called from
    /// within a tokio runtime.
    pub fn spawn(config: WorkerConfig, ctx: WorkerContext) -> WorkerHandle {
        let id = WorkerId::new();
        let config = Arc::new(config);
        let (tx, rx) = mpsc::unbounded_channel();
        let lifecycle = Lifecycle::new();
        let state = lifecycle.subscribe();
        let interceptor = Interceptor::new(config.clone(), ctx.caches.clone(), ctx.network.clone());

        let worker = Self {
            id,
            sync: SyncManager::new(config.sync.max_attempts),
            config: config.clone(),
            ctx,
            lifecycle,
            interceptor,
            events: tx.clone(),
        };
        log::info!("worker {} starting ({})", id.raw(), config.cache_version());
        tokio::spawn(worker.run(rx));

        WorkerHandle {
            id,
            version: config.cache_version(),
            tx,
            state,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Install { reply } => {
                    let result = self.install().await;
                    let _ = reply.send(result);
                }
                WorkerEvent::Activate { reply } => {
                    let _ = reply.send(self.activate());
                }
                WorkerEvent::Fetch { event, reply } => self.dispatch_fetch(event, reply),
                WorkerEvent::Message { payload, reply } => self.on_message(payload, reply),
                WorkerEvent::Connectivity(state) => {
                    if self.sync.set_network_state(state) {
                        log::info!("worker {} back online", self.id.raw());
                    }
                    self.fire_syncs();
                }
                WorkerEvent::SyncRegister { tag, reply } => {
                    let _ = reply.send(self.sync.register(tag));
                    self.fire_syncs();
                }
                WorkerEvent::SyncRetry { tag } => {
                    self.sync.rearm(&tag);
                    self.fire_syncs();
                }
                WorkerEvent::SyncDone { tag, result } => self.on_sync_done(tag, result),
                WorkerEvent::Push(message) => {
                    let notification = Notification::from_push(&message, &self.config.notification);
                    self.notify(ClientCommand::ShowNotification(notification));
                }
                WorkerEvent::NotificationClick { action } => {
                    match push::handle_click(action.as_deref(), &self.config.notification) {
                        ClickOutcome::OpenWindow(url) => self.notify(ClientCommand::OpenWindow(url)),
                        ClickOutcome::Dismiss => {}
                    }
                }
                WorkerEvent::Terminate => break,
            }
        }
        self.lifecycle.retire();
        log::info!("worker {} stopped", self.id.raw());
    }

    async fn install(&mut self) -> Result<ServiceWorkerState, WorkerError> {
        self.lifecycle.transition(ServiceWorkerState::Installing)?;
        let precached =
            lifecycle::precache(&self.config, &self.ctx.caches, self.ctx.network.as_ref()).await;
        self.lifecycle.transition(ServiceWorkerState::Installed)?;

        match precached {
            Ok(count) => {
                log::info!("worker {} precached {} assets", self.id.raw(), count);
                if self.config.skip_waiting {
                    self.activate()?;
                }
            }
            Err(err) => log::error!("worker {} install failed: {}", self.id.raw(), err),
        }
        Ok(self.lifecycle.state())
    }

    fn activate(&mut self) -> Result<(), WorkerError> {
        self.lifecycle.transition(ServiceWorkerState::Activating)?;
        let pruned = lifecycle::prune_stale_buckets(&self.config, &self.ctx.caches);
        self.lifecycle.record_pruned(pruned);
        self.lifecycle.transition(ServiceWorkerState::Activated)?;
        self.lifecycle.claim()?;
        log::info!("worker {} activated", self.id.raw());
        self.notify(ClientCommand::ControllerChanged(self.id));
        self.fire_syncs();
        Ok(())
    }

    fn dispatch_fetch(&self, event: FetchEvent, reply: oneshot::Sender<FetchResult>) {
        if !self.lifecycle.is_controlling() {
            let _ = reply.send(FetchResult::Passthrough);
            return;
        }
        let interceptor = self.interceptor.clone();
        tokio::spawn(async move {
            let result = interceptor.handle(&event).await;
            let _ = reply.send(result);
        });
    }

    fn on_message(&mut self, payload: serde_json::Value, reply: Option<oneshot::Sender<VersionReply>>) {
        match ControlMessage::parse(&payload) {
            Some(ControlMessage::SkipWaiting) => {
                if self.lifecycle.state() == ServiceWorkerState::Installed {
                    if let Err(err) = self.activate() {
                        log::error!("worker {} skip-waiting failed: {}", self.id.raw(), err);
                    }
                }
            }
            Some(ControlMessage::GetVersion) => {
                if let Some(reply) = reply {
                    let _ = reply.send(VersionReply {
                        version: self.config.cache_version(),
                    });
                }
            }
            None => {}
        }
    }

    /// Start drains for every registration that may fire now.
    fn fire_syncs(&mut self) {
        if self.lifecycle.state() != ServiceWorkerState::Activated {
            return;
        }
        for event in self.sync.fire_ready() {
            if event.tag != self.config.sync.tag {
                log::debug!("no sync work for tag {}", event.tag);
                self.sync.complete(&event.tag, true);
                continue;
            }
            if event.last_chance {
                log::warn!("last sync attempt for {}", event.tag);
            }
            let queue = self.ctx.queue.clone();
            let network = self.ctx.network.clone();
            let endpoint = self.config.sync_endpoint();
            let events = self.events.clone();
            tokio::spawn(async move {
                let result = bgsync::drain_queue(&queue, network.as_ref(), &endpoint)
                    .await
                    .map_err(|e| e.to_string());
                let _ = events.send(WorkerEvent::SyncDone {
                    tag: event.tag,
                    result,
                });
            });
        }
    }

    fn on_sync_done(&mut self, tag: String, result: Result<usize, String>) {
        let outcome = self.sync.complete(&tag, result.is_ok());
        match (result, outcome) {
            (Ok(synced), _) => {
                self.notify(ClientCommand::SyncCompleted {
                    tag: tag.clone(),
                    synced,
                });
                // actions queued while the drain was in flight; entries still
                // claimed by another drain are left to that drain
                if tag == self.config.sync.tag && self.ctx.queue.has_claimable() {
                    self.sync.register(tag);
                    self.fire_syncs();
                }
            }
            (Err(reason), Some(SyncOutcome::Retry { attempt })) => {
                let delay = self.config.sync.retry_delay(attempt);
                log::warn!("sync {} failed ({}), retry {} in {:?}", tag, reason, attempt, delay);
                self.schedule_retry(tag.clone(), delay);
                self.notify(ClientCommand::SyncFailed {
                    tag,
                    reason,
                    retry_in: Some(delay),
                });
            }
            (Err(reason), _) => {
                log::error!("sync {} abandoned: {}", tag, reason);
                self.notify(ClientCommand::SyncFailed {
                    tag,
                    reason,
                    retry_in: None,
                });
            }
        }
    }

    fn schedule_retry(&self, tag: String, delay: Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(WorkerEvent::SyncRetry { tag });
        });
    }

    fn notify(&self, command: ClientCommand) {
        if self.ctx.clients.send(command).is_err() {
            log::debug!("worker {}: no client listening", self.id.raw());
        }
    }
}
