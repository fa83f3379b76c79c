//! TechStore Offline Worker
//!
//! A cache-first offline worker for the storefront, modelled on the
//! browser service worker:
//!
//! - Lifecycle (install → activate) with precaching and version-scoped
//!   cache buckets
//! - Request interception with runtime caching and offline fallbacks
//! - Background sync of a durable offline action queue
//! - Push notifications and notification clicks
//! - A JSON control channel (`skip-waiting`, `get-version`)
//!
//! The worker runs as a tokio task and talks to the outside world through
//! the [`Network`] trait.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod message;
pub mod network;
pub mod outbox;
pub mod push;
pub mod registration;
pub mod sync;
pub mod worker;

pub use cache::CacheHandle;
pub use config::{NotificationConfig, SyncConfig, WorkerConfig};
pub use error::{ConfigError, NetworkError, StoreError, WorkerError};
pub use fetch::{Method, Request, Response, ResponseType};
pub use intercept::{FetchResult, FetchSource};
pub use lifecycle::ServiceWorkerState;
pub use message::{ControlMessage, VersionReply};
#[cfg(feature = "http")]
pub use network::HttpNetwork;
pub use network::{Network, SimulatedNetwork};
pub use outbox::{ActionKind, ActionQueue, ActionStatus, JsonFileStore, MemoryStore, PendingAction};
pub use push::{Notification, PushMessage};
pub use registration::Registration;
pub use sync::NetworkState;
pub use worker::{ClientCommand, OfflineWorker, WorkerContext, WorkerHandle, WorkerId};
