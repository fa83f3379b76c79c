//! Request Interception
//!
//! Cache-first handling of GET requests with runtime caching of
//! same-origin successes and an offline fallback when both the buckets
//! and the network come up empty.

use std::sync::Arc;

use crate::cache::CacheHandle;
use crate::config::WorkerConfig;
use crate::fetch::{FetchEventId, Method, Request, Response, ResponseType};
use crate::network::Network;

/// An intercepted request
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// Event ID
    id: FetchEventId,
    /// The request being made
    request: Request,
}

impl FetchEvent {
    /// Create new fetch event
    pub fn new(request: Request) -> Self {
        Self {
            id: FetchEventId::new(),
            request,
        }
    }

    /// Get event ID
    pub fn id(&self) -> FetchEventId {
        self.id
    }

    /// Get request
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// Where an intercepted response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// A bucket hit
    Cache,
    /// The network (possibly an error status)
    Network,
    /// Generated or cached fallback while offline
    OfflineFallback,
}

/// Outcome of an intercepted fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The worker answered
    Response {
        response: Response,
        source: FetchSource,
    },
    /// The worker did not handle the request; the page goes to the network
    Passthrough,
    /// Nothing could be served; the page sees a failed fetch
    Unresolved,
}

impl FetchResult {
    /// The response, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response { response, .. } => Some(response),
            _ => None,
        }
    }

    /// The source, if a response was produced
    pub fn source(&self) -> Option<FetchSource> {
        match self {
            Self::Response { source, .. } => Some(*source),
            _ => None,
        }
    }

    fn respond(response: Response, source: FetchSource) -> Self {
        Self::Response { response, source }
    }
}

/// Cache-first request handler. Cheap to clone; one clone per fetch task.
#[derive(Clone)]
pub struct Interceptor {
    config: Arc<WorkerConfig>,
    caches: CacheHandle,
    network: Arc<dyn Network>,
}

impl Interceptor {
    /// Create a handler over the given buckets and network
    pub fn new(config: Arc<WorkerConfig>, caches: CacheHandle, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            caches,
            network,
        }
    }

    /// Handle one intercepted request.
    pub async fn handle(&self, event: &FetchEvent) -> FetchResult {
        let request = event.request();
        if request.method != Method::Get {
            return FetchResult::Passthrough;
        }

        if let Some(cached) = self.caches.match_request(request) {
            log::debug!("fetch {}: cache hit {}", event.id().raw(), request.url);
            return FetchResult::respond(cached, FetchSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if is_cacheable(&response) {
                    let bucket = if self.config.is_precached(&request.url) {
                        self.config.static_bucket()
                    } else {
                        self.config.runtime_bucket()
                    };
                    if self.caches.put(&bucket, request.clone(), response.clone()) {
                        log::debug!("fetch {}: stored {} in {}", event.id().raw(), request.url, bucket);
                    } else {
                        log::debug!("fetch {}: {} is retired, not storing {}", event.id().raw(), bucket, request.url);
                    }
                }
                FetchResult::respond(response, FetchSource::Network)
            }
            Err(err) => {
                log::debug!("fetch {}: network failed for {}: {}", event.id().raw(), request.url, err);
                self.offline_fallback(request)
            }
        }
    }

    fn offline_fallback(&self, request: &Request) -> FetchResult {
        if request.accepts("text/html") {
            return match self.caches.match_url(&self.config.index_url()) {
                Some(index) => FetchResult::respond(index, FetchSource::OfflineFallback),
                None => {
                    log::warn!("offline with no cached index document");
                    FetchResult::Unresolved
                }
            };
        }
        if request.accepts("image") {
            return FetchResult::respond(Response::offline_placeholder(), FetchSource::OfflineFallback);
        }
        FetchResult::Unresolved
    }
}

/// Only same-origin successes are stored.
fn is_cacheable(response: &Response) -> bool {
    response.ok() && response.response_type == ResponseType::Basic
}
