//! Control Messages
//!
//! JSON messages the page posts to its worker.

use serde::{Deserialize, Serialize};

/// A recognized control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// Activate a waiting worker now
    SkipWaiting,
    /// Ask for the cache version
    GetVersion,
}

impl ControlMessage {
    /// Interpret a posted value. Anything that is not a recognized
    /// message yields `None`.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(message) => Some(message),
            Err(err) => {
                log::debug!("ignoring control message {}: {}", value, err);
                None
            }
        }
    }

    pub fn to_value(self) -> serde_json::Value {
        match self {
            Self::SkipWaiting => serde_json::json!({ "kind": "skip-waiting" }),
            Self::GetVersion => serde_json::json!({ "kind": "get-version" }),
        }
    }
}

/// Reply to [`ControlMessage::GetVersion`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}
