//! TechStore End-to-End Fixtures
//!
//! Wires a storefront page to an offline worker over a simulated network
//! so scenario tests can flip connectivity, bump versions and watch what
//! the worker tells its clients.

use std::sync::Arc;
use std::time::Duration;

use techstore_storefront::{Catalog, Storefront, StorefrontError};
use techstore_worker::{
    ActionQueue, CacheHandle, ClientCommand, Method, Registration, Response, SimulatedNetwork,
    WorkerConfig, WorkerContext,
};
use tokio::sync::mpsc;

/// How long scenario helpers wait for a worker notification.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Body served for the index document.
pub const INDEX_HTML: &str = "<!DOCTYPE html><html><head><title>TechStore</title></head><body><div id=\"productsGrid\"></div></body></html>";

/// A page with its worker and the network behind them.
pub struct Shop {
    pub config: WorkerConfig,
    pub page: Storefront,
    pub network: Arc<SimulatedNetwork>,
    pub clients: mpsc::UnboundedReceiver<ClientCommand>,
}

/// A network that serves every precache entry and accepts syncs.
pub fn served_network(config: &WorkerConfig) -> Arc<SimulatedNetwork> {
    let network = Arc::new(SimulatedNetwork::new(config.origin.clone()));
    for url in config.precache_urls() {
        let response = if url == config.index_url() || url == config.resolve("/") {
            Response::new(200)
                .with_header("content-type", "text/html")
                .with_body(INDEX_HTML)
        } else {
            Response::new(200).with_body(format!("/* {url} */"))
        };
        network.serve(url, response);
    }
    network.serve_method(Method::Post, config.sync_endpoint(), Response::new(200));
    network
}

/// Open the store with an in-memory queue and install `config`'s worker.
pub async fn open_shop(config: WorkerConfig) -> Result<Shop, StorefrontError> {
    let network = served_network(&config);
    open_shop_with(config, network, ActionQueue::in_memory()).await
}

/// Open the store over an existing network and queue.
pub async fn open_shop_with(
    config: WorkerConfig,
    network: Arc<SimulatedNetwork>,
    queue: ActionQueue,
) -> Result<Shop, StorefrontError> {
    let (clients_tx, clients) = mpsc::unbounded_channel();
    let ctx = WorkerContext {
        caches: CacheHandle::new(),
        network: network.clone(),
        queue,
        clients: clients_tx,
    };
    let registration = Registration::new(config.origin.clone(), ctx);
    let mut page = Storefront::new(Catalog::demo(), registration);
    page.install_worker(config.clone()).await?;
    Ok(Shop {
        config,
        page,
        network,
        clients,
    })
}

impl Shop {
    /// Absolute URL for a path on the shop's origin
    pub fn url(&self, path: &str) -> String {
        self.config.resolve(path)
    }

    /// The bucket store shared by the shop's workers
    pub fn caches(&self) -> &CacheHandle {
        &self.page.registration().context().caches
    }

    /// The durable action queue
    pub fn queue(&self) -> &ActionQueue {
        &self.page.registration().context().queue
    }

    /// Next client command accepted by `pick`, skipping the rest. `None`
    /// on timeout.
    pub async fn next_command<T>(
        &mut self,
        mut pick: impl FnMut(ClientCommand) -> Option<T>,
    ) -> Option<T> {
        let wait = async {
            while let Some(command) = self.clients.recv().await {
                if let Some(found) = pick(command) {
                    return Some(found);
                }
            }
            None
        };
        tokio::time::timeout(COMMAND_TIMEOUT, wait).await.ok().flatten()
    }

    /// Next sync result (completed or failed)
    pub async fn next_sync_result(&mut self) -> Option<ClientCommand> {
        self.next_command(|c| match c {
            ClientCommand::SyncCompleted { .. } | ClientCommand::SyncFailed { .. } => Some(c),
            _ => None,
        })
        .await
    }
}
