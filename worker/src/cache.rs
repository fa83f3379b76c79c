//! Cache Buckets
//!
//! Named request → response stores. Entries never expire on their own; a
//! bucket disappears as a whole when the worker that owns it is replaced
//! by one with a different version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use spin::RwLock;

use crate::fetch::{normalize_url, Method, Request, Response};

/// A cached request-response pair
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The request
    request: Request,
    /// The response
    response: Response,
    /// Milliseconds since the epoch when cached
    cached_at: i64,
    /// Size in bytes
    size: usize,
}

impl CacheEntry {
    fn new(request: Request, response: Response) -> Self {
        let size = response.body.len();
        Self {
            request,
            response,
            cached_at: chrono::Utc::now().timestamp_millis(),
            size,
        }
    }
}

/// A single named bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Bucket name
    name: String,
    /// Cached entries keyed by `METHOD:url`
    entries: BTreeMap<String, CacheEntry>,
    /// Total body size in bytes
    total_size: usize,
}

impl Bucket {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            total_size: 0,
        }
    }

    /// Get bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Match a request by method and URL
    pub fn match_request(&self, request: &Request) -> Option<Response> {
        self.match_key(request.method, &request.url)
    }

    /// Match by method and URL without building a request
    pub fn match_key(&self, method: Method, url: &str) -> Option<Response> {
        self.entries
            .get(&make_key(method, url))
            .map(|e| e.response.clone())
    }

    /// Store a request/response pair, replacing any previous entry
    pub fn put(&mut self, request: Request, response: Response) {
        let key = make_key(request.method, &request.url);
        let entry = CacheEntry::new(request, response);
        let size = entry.size;

        if let Some(old) = self.entries.remove(&key) {
            self.total_size = self.total_size.saturating_sub(old.size);
        }

        self.entries.insert(key, entry);
        self.total_size += size;
    }

    /// Delete a cached request
    pub fn delete(&mut self, request: &Request) -> bool {
        match self.entries.remove(&make_key(request.method, &request.url)) {
            Some(entry) => {
                self.total_size = self.total_size.saturating_sub(entry.size);
                true
            }
            None => false,
        }
    }

    /// All cached requests
    pub fn keys(&self) -> Vec<Request> {
        self.entries.values().map(|e| e.request.clone()).collect()
    }

    /// When the entry for `url` was stored
    pub fn cached_at(&self, method: Method, url: &str) -> Option<i64> {
        self.entries.get(&make_key(method, url)).map(|e| e.cached_at)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total body size
    pub fn size(&self) -> usize {
        self.total_size
    }
}

/// Make a cache key from method and normalized URL
fn make_key(method: Method, url: &str) -> String {
    format!("{}:{}", method.as_str(), normalize_url(url))
}

/// All buckets of one origin
#[derive(Debug, Default)]
pub struct CacheStorage {
    /// Buckets by name
    buckets: BTreeMap<String, Bucket>,
    /// Buckets of the active version, once one has pruned the rest
    current: Option<BTreeSet<String>>,
}

impl CacheStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a bucket
    pub fn open(&mut self, name: &str) -> &mut Bucket {
        self.buckets
            .entry(name.to_string())
            .or_insert_with(|| Bucket::new(name))
    }

    /// Get a bucket if it exists
    pub fn get(&self, name: &str) -> Option<&Bucket> {
        self.buckets.get(name)
    }

    /// Check if a bucket exists
    pub fn has(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Delete a bucket and everything in it
    pub fn delete(&mut self, name: &str) -> bool {
        self.buckets.remove(name).is_some()
    }

    /// All bucket names
    pub fn keys(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    /// Delete every bucket not named in `keep` and make `keep` the current
    /// set. Returns the deleted names.
    pub fn retain_only(&mut self, keep: &[String]) -> Vec<String> {
        let deleted: Vec<String> = self
            .buckets
            .keys()
            .filter(|name| !keep.contains(name))
            .cloned()
            .collect();
        for name in &deleted {
            self.delete(name);
        }
        self.current = Some(keep.iter().cloned().collect());
        deleted
    }

    /// Whether runtime writes into `name` are accepted
    pub fn is_current(&self, name: &str) -> bool {
        self.current
            .as_ref()
            .map_or(true, |current| current.contains(name))
    }

    /// Match across all buckets; the first bucket in name order wins
    pub fn match_request(&self, request: &Request) -> Option<Response> {
        self.buckets
            .values()
            .find_map(|bucket| bucket.match_request(request))
    }

    /// Match a URL with a given method across all buckets
    pub fn match_key(&self, method: Method, url: &str) -> Option<Response> {
        self.buckets
            .values()
            .find_map(|bucket| bucket.match_key(method, url))
    }

    /// Total body size across buckets
    pub fn usage(&self) -> usize {
        self.buckets.values().map(|b| b.size()).sum()
    }
}

/// Shared handle to an origin's buckets.
///
/// Cloned into every fetch task. The lock is only taken for the duration
/// of a single lookup or write and is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct CacheHandle {
    inner: Arc<RwLock<CacheStorage>>,
}

impl CacheHandle {
    /// Create a handle over empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a request up in any bucket
    pub fn match_request(&self, request: &Request) -> Option<Response> {
        self.inner.read().match_request(request)
    }

    /// Look a GET for `url` up in any bucket
    pub fn match_url(&self, url: &str) -> Option<Response> {
        self.inner.read().match_key(Method::Get, url)
    }

    /// Look a request up in one bucket
    pub fn match_in(&self, bucket: &str, request: &Request) -> Option<Response> {
        self.inner
            .read()
            .get(bucket)
            .and_then(|b| b.match_request(request))
    }

    /// Store a pair in the named bucket, creating it if needed.
    ///
    /// After [`retain_only`](Self::retain_only) only the retained buckets
    /// accept writes; anything else is dropped and `false` returned.
    pub fn put(&self, bucket: &str, request: Request, response: Response) -> bool {
        let mut storage = self.inner.write();
        if !storage.is_current(bucket) {
            return false;
        }
        storage.open(bucket).put(request, response);
        true
    }

    /// Store several pairs in one write, regardless of the current set
    pub fn put_all(&self, bucket: &str, pairs: Vec<(Request, Response)>) {
        let mut storage = self.inner.write();
        let bucket = storage.open(bucket);
        for (request, response) in pairs {
            bucket.put(request, response);
        }
    }

    /// Create an empty bucket if it does not exist yet
    pub fn open(&self, bucket: &str) {
        self.inner.write().open(bucket);
    }

    /// Check if a bucket exists
    pub fn has(&self, bucket: &str) -> bool {
        self.inner.read().has(bucket)
    }

    /// Delete every bucket not in `keep`; see [`CacheStorage::retain_only`]
    pub fn retain_only(&self, keep: &[String]) -> Vec<String> {
        self.inner.write().retain_only(keep)
    }

    /// All bucket names
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys()
    }

    /// Number of entries in a bucket (0 when missing)
    pub fn len_of(&self, bucket: &str) -> usize {
        self.inner.read().get(bucket).map(|b| b.len()).unwrap_or(0)
    }

    /// Total body size across buckets
    pub fn usage(&self) -> usize {
        self.inner.read().usage()
    }
}
