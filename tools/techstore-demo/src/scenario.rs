//! Scripted sessions.
//!
//! Each subcommand opens the storefront over a [`SimulatedNetwork`] that
//! serves the configured precache list and accepts syncs, drives it, and
//! returns a serializable report.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use techstore_storefront::{CartSummary, Catalog, CategoryFilter, Storefront};
use techstore_worker::{
    ActionQueue, CacheHandle, ClientCommand, Method, Notification, PushMessage, Registration,
    Response, SimulatedNetwork, WorkerConfig, WorkerContext,
};

use crate::cli::{PushArgs, SessionArgs, UpdateArgs};
use crate::error::DemoError;

/// How long to wait for a click to open a window before assuming it
/// only dismissed the notification.
const CLICK_GRACE: Duration = Duration::from_millis(500);

/// A page, its worker and the simulated origin behind them.
pub struct Session {
    pub config: WorkerConfig,
    pub page: Storefront,
    pub network: Arc<SimulatedNetwork>,
    clients: mpsc::UnboundedReceiver<ClientCommand>,
}

/// Network that serves every precache entry and accepts syncs.
pub fn simulated_origin(config: &WorkerConfig) -> Arc<SimulatedNetwork> {
    let network = Arc::new(SimulatedNetwork::new(config.origin.clone()));
    for url in config.precache_urls() {
        let content_type = if url == config.index_url() || url == config.resolve("/") {
            "text/html"
        } else if url.ends_with(".css") {
            "text/css"
        } else if url.ends_with(".js") {
            "application/javascript"
        } else {
            "application/json"
        };
        let response = Response::new(200)
            .with_header("content-type", content_type)
            .with_body(format!("/* {url} */"));
        network.serve(url, response);
    }
    network.serve_method(Method::Post, config.sync_endpoint(), Response::new(200));
    network
}

impl Session {
    /// Open the store and install `config`'s worker.
    pub async fn open(config: WorkerConfig) -> Result<Self, DemoError> {
        let network = simulated_origin(&config);
        let (tx, clients) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            caches: CacheHandle::new(),
            network: network.clone(),
            queue: ActionQueue::in_memory(),
            clients: tx,
        };
        let registration = Registration::new(config.origin.clone(), ctx);
        let mut page = Storefront::new(Catalog::demo(), registration);
        page.install_worker(config.clone()).await?;
        if page.registration().active().is_none() {
            return Err(DemoError::NoController);
        }
        Ok(Self {
            config,
            page,
            network,
            clients,
        })
    }

    async fn next_command<T>(
        &mut self,
        wait: Duration,
        mut pick: impl FnMut(ClientCommand) -> Option<T>,
    ) -> Option<T> {
        let clients = &mut self.clients;
        let search = async {
            while let Some(command) = clients.recv().await {
                if let Some(found) = pick(command) {
                    return Some(found);
                }
            }
            None
        };
        tokio::time::timeout(wait, search).await.ok().flatten()
    }
}

// ── Session ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub version: Option<String>,
    /// Names of the products visible after search and filtering
    pub products: Vec<String>,
    pub cart: CartSummary,
    /// Actions queued while offline
    pub queued: usize,
    pub synced: Option<usize>,
    pub sync_error: Option<String>,
    pub receipt: String,
}

pub async fn run_session(config: WorkerConfig, args: &SessionArgs) -> Result<SessionReport, DemoError> {
    let filter: CategoryFilter = args
        .category
        .parse()
        .map_err(|_| DemoError::UnknownCategory(args.category.clone()))?;
    let mut session = Session::open(config).await?;

    if let Some(query) = &args.search {
        session.page.set_query(query.clone());
    }
    session.page.set_category(filter);
    let products = session
        .page
        .visible_products()
        .iter()
        .map(|p| p.name.clone())
        .collect();

    if args.offline {
        session.network.set_online(false);
        session.page.go_offline().await?;
    }
    for id in &args.add {
        session.page.add_to_cart(*id).await?;
    }
    let cart = session.page.cart_summary();
    let queued = session.page.registration().context().queue.len();

    let (mut synced, mut sync_error) = (None, None);
    if args.offline {
        session.network.set_online(true);
        session.page.go_online().await?;
        let result = session
            .next_command(Duration::from_secs(args.timeout), |c| match c {
                ClientCommand::SyncCompleted { synced, .. } => Some(Ok(synced)),
                ClientCommand::SyncFailed { reason, .. } => Some(Err(reason)),
                _ => None,
            })
            .await
            .ok_or(DemoError::Timeout {
                what: "background sync",
                seconds: args.timeout,
            })?;
        match result {
            Ok(count) => synced = Some(count),
            Err(reason) => sync_error = Some(reason),
        }
    }

    let receipt = session.page.checkout()?;
    Ok(SessionReport {
        version: session.page.worker_version().await?,
        products,
        cart,
        queued,
        synced,
        sync_error,
        receipt: receipt.to_string(),
    })
}

// ── Update ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UpdateReport {
    pub from: Option<String>,
    pub to: Option<String>,
    pub update_available: bool,
    pub applied: bool,
    /// Buckets left after the update
    pub buckets: Vec<String>,
}

pub async fn run_update(config: WorkerConfig, args: &UpdateArgs) -> Result<UpdateReport, DemoError> {
    let next = WorkerConfig {
        skip_waiting: false,
        ..config.clone().with_version(args.version.clone())
    };
    next.validate()?;

    let mut session = Session::open(config).await?;
    let from = session.page.worker_version().await?;

    session.page.install_worker(next).await?;
    let update_available = session.page.update_available();
    let applied = if args.no_apply {
        false
    } else {
        session.page.apply_update().await?
    };

    Ok(UpdateReport {
        from,
        to: session.page.worker_version().await?,
        update_available,
        applied,
        buckets: session.page.registration().context().caches.keys(),
    })
}

// ── Push ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PushReport {
    pub notification: Notification,
    /// Window opened by the click, if any
    pub opened: Option<String>,
}

pub async fn run_push(config: WorkerConfig, args: &PushArgs) -> Result<PushReport, DemoError> {
    let mut session = Session::open(config).await?;
    let worker = session
        .page
        .registration()
        .active()
        .cloned()
        .ok_or(DemoError::NoController)?;

    let message = match &args.message {
        Some(text) => PushMessage::text(text.clone()),
        None => PushMessage::new(None),
    };
    worker.push(message)?;
    let notification = session
        .next_command(Duration::from_secs(5), |c| match c {
            ClientCommand::ShowNotification(n) => Some(n),
            _ => None,
        })
        .await
        .ok_or(DemoError::Timeout {
            what: "notification",
            seconds: 5,
        })?;

    worker.notification_click(args.action.as_deref())?;
    let opened = session
        .next_command(CLICK_GRACE, |c| match c {
            ClientCommand::OpenWindow(path) => Some(path),
            _ => None,
        })
        .await;

    Ok(PushReport {
        notification,
        opened,
    })
}
