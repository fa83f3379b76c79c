//! Storefront Controller
//!
//! Page-side state: the catalog view, the cart, the connectivity banner
//! and the worker registration. Offline cart actions are written to the
//! shared action queue and handed to the worker's background sync.

use std::fmt;

use techstore_worker::{
    ActionKind, FetchResult, NetworkState, Registration, Request, Response, ServiceWorkerState,
    SyncConfig, WorkerConfig,
};

use crate::cart::{Cart, CartSummary};
use crate::catalog::{Catalog, CatalogItem, CategoryFilter, Price};
use crate::connectivity::Connectivity;
use crate::error::StorefrontError;

/// Result of a successful checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub item_count: u32,
    pub total: Price,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thank you for your purchase! Total: ${}", self.total)
    }
}

pub struct Storefront {
    catalog: Catalog,
    cart: Cart,
    query: String,
    filter: CategoryFilter,
    connectivity: Connectivity,
    registration: Registration,
    /// Background sync tag for queued cart actions
    sync_tag: String,
}

impl Storefront {
    pub fn new(catalog: Catalog, registration: Registration) -> Self {
        Self {
            catalog,
            cart: Cart::new(),
            query: String::new(),
            filter: CategoryFilter::All,
            connectivity: Connectivity::default(),
            registration,
            sync_tag: SyncConfig::default().tag,
        }
    }

    // ── Worker ──────────────────────────────────────────────

    /// Register and install a worker built from `config`.
    pub async fn install_worker(
        &mut self,
        config: WorkerConfig,
    ) -> Result<ServiceWorkerState, StorefrontError> {
        self.sync_tag = config.sync.tag.clone();
        let state = self.registration.register(config).await?;
        if !self.connectivity.is_online() {
            if let Some(active) = self.registration.active() {
                active.set_network_state(NetworkState::Offline)?;
            }
        }
        if self.registration.update_available() {
            log::info!("New version available!");
        }
        Ok(state)
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn update_available(&self) -> bool {
        self.registration.update_available()
    }

    /// Activate the waiting worker, if any
    pub async fn apply_update(&mut self) -> Result<bool, StorefrontError> {
        let applied = self.registration.apply_update().await?;
        if applied && !self.connectivity.is_online() {
            if let Some(active) = self.registration.active() {
                active.set_network_state(NetworkState::Offline)?;
            }
        }
        Ok(applied)
    }

    /// Cache version of the controlling worker
    pub async fn worker_version(&self) -> Result<Option<String>, StorefrontError> {
        Ok(self.registration.version().await?.map(|reply| reply.version))
    }

    /// Fetch through the controlling worker, falling back to the network
    /// when the worker passes the request through.
    pub async fn fetch(&self, request: Request) -> Result<Response, StorefrontError> {
        let url = request.url.clone();
        let network = self.registration.context().network.clone();
        let result = match self.registration.active() {
            Some(worker) => worker.fetch(request.clone()).await?,
            None => FetchResult::Passthrough,
        };
        match result {
            FetchResult::Response { response, .. } => Ok(response),
            FetchResult::Passthrough => Ok(network.fetch(&request).await?),
            FetchResult::Unresolved => Err(StorefrontError::FetchFailed { url }),
        }
    }

    async fn request_sync(&self) -> Result<(), StorefrontError> {
        match self.registration.active() {
            Some(worker) => {
                worker.register_sync(&self.sync_tag).await?;
            }
            None => log::warn!("no active worker; {} not registered", self.sync_tag),
        }
        Ok(())
    }

    // ── Catalog view ────────────────────────────────────────

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn set_category(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    /// Products matching the current query and category
    pub fn visible_products(&self) -> Vec<&CatalogItem> {
        self.catalog.search(&self.query, self.filter)
    }

    // ── Cart ────────────────────────────────────────────────

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_summary(&self) -> CartSummary {
        self.cart.summary()
    }

    /// Add one of product `id`. While offline the action is also queued
    /// for background sync.
    pub async fn add_to_cart(&mut self, id: u32) -> Result<CartSummary, StorefrontError> {
        let item = self
            .catalog
            .get(id)
            .ok_or(StorefrontError::UnknownItem(id))?
            .clone();

        if self.connectivity.is_online() {
            self.cart.add(&item);
            return Ok(self.cart.summary());
        }

        // the cart only changes once the action is durably queued
        let snapshot = serde_json::to_value(&item)?;
        self.registration
            .context()
            .queue
            .enqueue(ActionKind::Add, snapshot)?;
        self.cart.add(&item);
        self.connectivity.action_saved();
        self.request_sync().await?;
        Ok(self.cart.summary())
    }

    pub fn remove_from_cart(&mut self, id: u32) -> CartSummary {
        self.cart.remove(id);
        self.cart.summary()
    }

    pub fn change_quantity(&mut self, id: u32, delta: i64) -> CartSummary {
        self.cart.change_quantity(id, delta);
        self.cart.summary()
    }

    /// Empty the cart and return what was bought
    pub fn checkout(&mut self) -> Result<Receipt, StorefrontError> {
        if self.cart.is_empty() {
            return Err(StorefrontError::EmptyCart);
        }
        let summary = self.cart.summary();
        self.cart.clear();
        let receipt = Receipt {
            item_count: summary.item_count,
            total: summary.total,
        };
        log::info!("{}", receipt);
        Ok(receipt)
    }

    // ── Connectivity ────────────────────────────────────────

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub async fn go_offline(&mut self) -> Result<(), StorefrontError> {
        self.connectivity.go_offline();
        if let Some(worker) = self.registration.active() {
            worker.set_network_state(NetworkState::Offline)?;
        }
        Ok(())
    }

    /// Back online: tell the worker and ask for a cart sync.
    pub async fn go_online(&mut self) -> Result<(), StorefrontError> {
        self.connectivity.go_online();
        if let Some(worker) = self.registration.active() {
            worker.set_network_state(NetworkState::Online)?;
        }
        self.request_sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::connectivity::{ACTION_SAVED, BACK_ONLINE};
    use std::sync::Arc;
    use techstore_worker::outbox::ActionStore;
    use techstore_worker::{
        ActionQueue, CacheHandle, ClientCommand, FetchSource, Method, PendingAction,
        SimulatedNetwork, StoreError, WorkerContext,
    };
    use tokio::sync::mpsc;

    struct Harness {
        store: Storefront,
        net: Arc<SimulatedNetwork>,
        clients: mpsc::UnboundedReceiver<ClientCommand>,
    }

    async fn harness() -> Harness {
        let config = WorkerConfig::default();
        let net = Arc::new(SimulatedNetwork::new(config.origin.clone()));
        for url in config.precache_urls() {
            net.serve(url.clone(), Response::new(200).with_body(url.into_bytes()));
        }
        net.serve_method(Method::Post, config.sync_endpoint(), Response::new(200));
        let (tx, clients) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            caches: CacheHandle::new(),
            network: net.clone(),
            queue: ActionQueue::in_memory(),
            clients: tx,
        };
        let mut store = Storefront::new(Catalog::demo(), Registration::new(config.origin.clone(), ctx));
        store.install_worker(config).await.unwrap();
        Harness { store, net, clients }
    }

    #[tokio::test]
    async fn test_query_and_filter_combine() {
        let mut h = harness().await;
        h.store.set_query("pro");
        let ids: Vec<u32> = h.store.visible_products().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3, 5, 7]);

        h.store.set_category(CategoryFilter::Only(Category::Accessories));
        let ids: Vec<u32> = h.store.visible_products().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7]);

        h.store.set_query("");
        assert_eq!(h.store.visible_products().len(), 2);
    }

    #[tokio::test]
    async fn test_add_twice_and_checkout() {
        let mut h = harness().await;
        h.store.add_to_cart(1).await.unwrap();
        let summary = h.store.add_to_cart(1).await.unwrap();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total.to_string(), "1999.98");

        let receipt = h.store.checkout().unwrap();
        assert_eq!(receipt.to_string(), "Thank you for your purchase! Total: $1999.98");
        assert!(h.store.cart().is_empty());
        assert!(matches!(h.store.checkout(), Err(StorefrontError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let mut h = harness().await;
        assert!(matches!(
            h.store.add_to_cart(42).await,
            Err(StorefrontError::UnknownItem(42))
        ));
    }

    #[tokio::test]
    async fn test_online_add_does_not_queue() {
        let mut h = harness().await;
        h.store.add_to_cart(3).await.unwrap();
        assert!(h.store.registration().context().queue.is_empty());
        assert!(h.store.connectivity().banner().is_none());
    }

    #[tokio::test]
    async fn test_offline_add_queues_and_syncs_on_reconnect() {
        let mut h = harness().await;
        h.store.go_offline().await.unwrap();
        h.store.add_to_cart(6).await.unwrap();

        let queue = h.store.registration().context().queue.clone();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].item["name"], "Sony WH-1000XM5");
        assert_eq!(h.store.connectivity().banner().unwrap().message, ACTION_SAVED);

        h.store.go_online().await.unwrap();
        assert_eq!(h.store.connectivity().banner().unwrap().message, BACK_ONLINE);
        loop {
            if let Some(ClientCommand::SyncCompleted { synced, .. }) = h.clients.recv().await {
                assert_eq!(synced, 1);
                break;
            }
        }
        assert!(queue.is_empty());
        let endpoint = WorkerConfig::default().sync_endpoint();
        assert_eq!(h.net.request_count(&endpoint), 1);
    }

    /// Store that refuses every write.
    struct ReadOnlyStore;

    impl ActionStore for ReadOnlyStore {
        fn load(&self) -> Result<Vec<PendingAction>, StoreError> {
            Ok(Vec::new())
        }

        fn save(&self, _entries: &[PendingAction]) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "actions.json".into(),
                source: std::io::Error::other("read-only file system"),
            })
        }
    }

    #[tokio::test]
    async fn test_offline_add_not_applied_when_queue_write_fails() {
        let config = WorkerConfig::default();
        let net = Arc::new(SimulatedNetwork::new(config.origin.clone()));
        for url in config.precache_urls() {
            net.serve(url.clone(), Response::new(200));
        }
        let (tx, _clients) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            caches: CacheHandle::new(),
            network: net,
            queue: ActionQueue::open(Arc::new(ReadOnlyStore)).unwrap(),
            clients: tx,
        };
        let mut store = Storefront::new(Catalog::demo(), Registration::new(config.origin.clone(), ctx));
        store.install_worker(config).await.unwrap();
        store.go_offline().await.unwrap();

        assert!(matches!(
            store.add_to_cart(2).await,
            Err(StorefrontError::Store(_))
        ));
        assert!(store.cart().is_empty());
        assert!(store.registration().context().queue.is_empty());
        assert_ne!(
            store.connectivity().banner().map(|b| b.message),
            Some(ACTION_SAVED)
        );
    }

    #[tokio::test]
    async fn test_fetch_goes_through_worker() {
        let h = harness().await;
        let response = h.store.fetch(Request::get("https://techstore.local/styles.css")).await.unwrap();
        assert_eq!(response.text(), "https://techstore.local/styles.css");

        h.net.set_online(false);
        let image = h
            .store
            .fetch(Request::get("https://techstore.local/img/1.png").accepting("image/*"))
            .await
            .unwrap();
        assert_eq!(image.content_type(), Some("image/svg+xml"));

        let api = h.store.fetch(Request::get("https://techstore.local/api/products")).await;
        assert!(matches!(api, Err(StorefrontError::FetchFailed { .. })));
    }

    #[tokio::test]
    async fn test_post_passes_through_to_network() {
        let h = harness().await;
        let endpoint = WorkerConfig::default().sync_endpoint();
        let response = h.store.fetch(Request::post(endpoint.clone(), b"[]".to_vec())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(h.net.request_count(&endpoint), 1);

        let worker = h.store.registration().active().unwrap();
        let direct = worker.fetch(Request::get("https://techstore.local/")).await.unwrap();
        assert_eq!(direct.source(), Some(FetchSource::Cache));
    }

    #[tokio::test]
    async fn test_worker_version() {
        let h = harness().await;
        assert_eq!(
            h.store.worker_version().await.unwrap().as_deref(),
            Some("techstore-v1.0.0")
        );
    }
}
