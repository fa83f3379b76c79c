//! Network Seam
//!
//! The worker never talks to sockets directly; it goes through [`Network`].
//! [`SimulatedNetwork`] backs tests and the demo, and `HttpNetwork` (behind
//! the `http` feature) talks to a real origin.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use spin::RwLock;

use crate::error::NetworkError;
use crate::fetch::{same_origin, Method, Request, Response, ResponseType};

/// Something that can perform a network round trip.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. `Err` means the request never produced a
    /// response (offline, connection failure); HTTP error statuses are
    /// returned as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// In-process network with canned routes and an on/off switch.
pub struct SimulatedNetwork {
    /// Origin whose responses are classified as `basic`
    origin: String,
    /// Connectivity switch
    online: AtomicBool,
    /// Canned responses by `(method, url)`
    routes: RwLock<BTreeMap<(Method, String), Response>>,
    /// Every request that reached the network, in order
    log: RwLock<Vec<Request>>,
}

impl SimulatedNetwork {
    /// Create an online network with no routes
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            online: AtomicBool::new(true),
            routes: RwLock::new(BTreeMap::new()),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Serve `response` for GET requests to `url`
    pub fn serve(&self, url: impl Into<String>, response: Response) {
        self.serve_method(Method::Get, url, response);
    }

    /// Serve `response` for `method` requests to `url`
    pub fn serve_method(&self, method: Method, url: impl Into<String>, response: Response) {
        self.routes.write().insert((method, url.into()), response);
    }

    /// Drop a route; later requests get a 404
    pub fn unserve(&self, method: Method, url: &str) {
        self.routes.write().remove(&(method, url.to_string()));
    }

    /// Flip connectivity
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Current connectivity
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Requests seen so far (including ones that failed offline)
    pub fn requests(&self) -> Vec<Request> {
        self.log.read().clone()
    }

    /// Number of requests seen for `url`
    pub fn request_count(&self, url: &str) -> usize {
        self.log.read().iter().filter(|r| r.url == url).count()
    }

    /// Forget the request log
    pub fn clear_log(&self) {
        self.log.write().clear();
    }

    fn classify(&self, url: &str, response: Response) -> Response {
        let response = response.with_url(url);
        match response.response_type {
            ResponseType::Default if same_origin(url, &self.origin) => {
                response.with_type(ResponseType::Basic)
            }
            ResponseType::Default => response.with_type(ResponseType::Cors),
            _ => response,
        }
    }
}

#[async_trait]
impl Network for SimulatedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.log.write().push(request.clone());

        if !self.is_online() {
            return Err(NetworkError::Offline);
        }

        let route = self
            .routes
            .read()
            .get(&(request.method, request.url.clone()))
            .cloned();
        let response = route.unwrap_or_else(|| Response::new(404));
        Ok(self.classify(&request.url, response))
    }
}

#[cfg(feature = "http")]
pub use http::HttpNetwork;

#[cfg(feature = "http")]
mod http {
    use super::*;

    /// Network backed by a `reqwest` client.
    pub struct HttpNetwork {
        client: reqwest::Client,
        origin: String,
    }

    impl HttpNetwork {
        /// Create a client that classifies responses from `origin` as `basic`
        pub fn new(origin: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                origin: origin.into(),
            }
        }
    }

    fn to_reqwest(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }

    #[async_trait]
    impl Network for HttpNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            let url = reqwest::Url::parse(&request.url)
                .map_err(|_| NetworkError::InvalidUrl(request.url.clone()))?;
            let mut builder = self.client.request(to_reqwest(request.method), url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let unreachable = |e: reqwest::Error| NetworkError::Unreachable {
                url: request.url.clone(),
                reason: e.to_string(),
            };
            let reply = builder.send().await.map_err(unreachable)?;

            let final_url = reply.url().to_string();
            let mut response = Response::new(reply.status().as_u16()).with_url(&final_url);
            for (name, value) in reply.headers() {
                if let Ok(value) = value.to_str() {
                    response = response.with_header(name.as_str(), value);
                }
            }
            let body = reply.bytes().await.map_err(unreachable)?;
            let response_type = if same_origin(&final_url, &self.origin) {
                ResponseType::Basic
            } else {
                ResponseType::Cors
            };
            Ok(response.with_body(body.to_vec()).with_type(response_type))
        }
    }
}
