//! Worker configuration.
//!
//! Every constant the worker needs (bucket version, precache list, sync
//! endpoint, notification presentation) lives here so that a deploy only
//! has to bump `version` to invalidate both buckets together.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::fetch::normalize_url;

/// Top-level worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Application name, used as the bucket name prefix.
    pub app_name: String,
    /// Cache version. Embedded in both bucket names.
    pub version: String,
    /// Origin the worker is registered for (scheme + host + port).
    pub origin: String,
    /// Document served as the offline fallback for HTML navigations.
    pub index_path: String,
    /// Activate as soon as install succeeds instead of waiting.
    pub skip_waiting: bool,
    /// Assets fetched and stored at install time.
    pub precache: Vec<String>,
    /// Background sync settings.
    pub sync: SyncConfig,
    /// Push notification presentation.
    pub notification: NotificationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: "techstore".to_string(),
            version: "v1.0.0".to_string(),
            origin: "https://techstore.local".to_string(),
            index_path: "/index.html".to_string(),
            skip_waiting: true,
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/styles.css".to_string(),
                "/script.js".to_string(),
                "/manifest.json".to_string(),
                "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css"
                    .to_string(),
            ],
            sync: SyncConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

/// Background sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tag the cart queue is registered under.
    pub tag: String,
    /// Endpoint the queue is POSTed to, relative to the origin.
    pub endpoint: String,
    /// Back-off delays between failed attempts, in seconds.
    pub retry_delays_secs: Vec<u64>,
    /// Failed attempts before the registration gets its last chance.
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: "cart-sync".to_string(),
            endpoint: "/api/cart/sync".to_string(),
            retry_delays_secs: vec![30, 60, 300],
            max_attempts: 3,
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `attempt` (1-based). The last configured
    /// delay repeats once the list is exhausted.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let idx = (attempt.max(1) as usize - 1).min(self.retry_delays_secs.len().saturating_sub(1));
        Duration::from_secs(self.retry_delays_secs.get(idx).copied().unwrap_or(0))
    }
}

/// How push notifications are presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    /// Body used when the push carries no payload.
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub action_icon: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Opened by the "explore" action.
    pub explore_url: String,
    /// Opened when the notification body itself is clicked.
    pub home_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "TechStore".to_string(),
            default_body: "New update available!".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            badge: "/icons/icon-72x72.png".to_string(),
            action_icon: "/icons/icon-96x96.png".to_string(),
            vibrate: vec![200, 100, 200],
            explore_url: "/#products".to_string(),
            home_url: "/".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the values that the rest of the worker relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        let origin = Url::parse(&self.origin).map_err(|e| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if origin.cannot_be_a_base() {
            return Err(ConfigError::InvalidOrigin {
                origin: self.origin.clone(),
                reason: "origin cannot be used as a base URL".to_string(),
            });
        }
        Ok(())
    }

    /// Same config with a different version, as a deploy would produce.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Name of the bucket populated at install time.
    pub fn static_bucket(&self) -> String {
        format!("{}-static-{}", self.app_name, self.version)
    }

    /// Name of the bucket filled opportunistically at runtime.
    pub fn runtime_bucket(&self) -> String {
        format!("{}-dynamic-{}", self.app_name, self.version)
    }

    /// Version string reported over the control channel.
    pub fn cache_version(&self) -> String {
        format!("{}-{}", self.app_name, self.version)
    }

    /// Resolve a path (or absolute URL) against the configured origin.
    pub fn resolve(&self, path: &str) -> String {
        match Url::parse(&self.origin).and_then(|base| base.join(path)) {
            Ok(url) => url.to_string(),
            Err(_) => path.to_string(),
        }
    }

    /// Precache entries as absolute URLs.
    pub fn precache_urls(&self) -> Vec<String> {
        self.precache.iter().map(|p| self.resolve(p)).collect()
    }

    /// Whether `url` is one of the precache entries, compared in
    /// normalized form.
    pub fn is_precached(&self, url: &str) -> bool {
        let url = normalize_url(url);
        self.precache.iter().any(|p| self.resolve(p) == url)
    }

    /// Absolute URL of the offline fallback document.
    pub fn index_url(&self) -> String {
        self.resolve(&self.index_path)
    }

    /// Absolute URL of the sync endpoint.
    pub fn sync_endpoint(&self) -> String {
        self.resolve(&self.sync.endpoint)
    }
}
