//! Push Notifications
//!
//! Turning a push payload into a notification, and a click on it into a
//! window to open.

use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;

/// Action ID for the "View Products" button
pub const ACTION_EXPLORE: &str = "explore";
/// Action ID for the "Close" button
pub const ACTION_CLOSE: &str = "close";

/// A push message as delivered to the worker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushMessage {
    /// Raw payload, if the push carried one
    data: Option<Vec<u8>>,
}

impl PushMessage {
    pub fn new(data: Option<Vec<u8>>) -> Self {
        Self { data }
    }

    /// Message carrying a text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: Some(text.into().into_bytes()),
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Payload as text. Invalid UTF-8 counts as no payload.
    pub fn as_text(&self) -> Option<&str> {
        self.data.as_deref().and_then(|d| std::str::from_utf8(d).ok())
    }
}

/// A button on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Data attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Milliseconds since the epoch
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

/// A notification ready to be shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Build the notification for a push. The body is the payload text,
    /// or the configured default when the push is empty.
    pub fn from_push(message: &PushMessage, config: &NotificationConfig) -> Self {
        let body = message
            .as_text()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| config.default_body.clone());

        Self {
            title: config.title.clone(),
            body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                date_of_arrival: chrono::Utc::now().timestamp_millis(),
                primary_key: 1,
            },
            actions: vec![
                NotificationAction {
                    action: ACTION_EXPLORE.to_string(),
                    title: "View Products".to_string(),
                    icon: config.action_icon.clone(),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: "Close".to_string(),
                    icon: config.action_icon.clone(),
                },
            ],
        }
    }
}

/// What a notification click asks the page to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Open a window at this path
    OpenWindow(String),
    /// Just close the notification
    Dismiss,
}

/// Resolve a click on a notification. `action` is the button ID, or
/// `None` when the notification body was clicked.
pub fn handle_click(action: Option<&str>, config: &NotificationConfig) -> ClickOutcome {
    match action {
        Some(ACTION_EXPLORE) => ClickOutcome::OpenWindow(config.explore_url.clone()),
        Some(ACTION_CLOSE) => ClickOutcome::Dismiss,
        _ => ClickOutcome::OpenWindow(config.home_url.clone()),
    }
}
