use std::process::ExitCode;

use techstore_storefront::StorefrontError;
use techstore_worker::{ConfigError, WorkerError};

/// All errors produced by techstore-demo.
///
/// - **Setup errors** (exit code 2): bad config, bad arguments, I/O
/// - **Session errors** (exit code 1): the scripted session went wrong
#[derive(thiserror::Error, Debug)]
pub enum DemoError {
    // ── Setup errors (exit code 2) ───────────────────────────────────

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Session errors (exit code 1) ─────────────────────────────────

    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("no worker took control of the page")]
    NoController,

    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: &'static str, seconds: u64 },
}

impl DemoError {
    /// Map each error variant to its process exit code.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Raw numeric exit code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::UnknownCategory(_) | Self::Json(_) => 2,
            Self::Storefront(_) | Self::Worker(_) | Self::NoController | Self::Timeout { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_exit_2() {
        assert_eq!(DemoError::Config(ConfigError::EmptyVersion).code(), 2);
        assert_eq!(DemoError::UnknownCategory("toys".into()).code(), 2);
    }

    #[test]
    fn test_session_errors_exit_1() {
        assert_eq!(DemoError::NoController.code(), 1);
        assert_eq!(
            DemoError::Timeout { what: "sync", seconds: 5 }.code(),
            1
        );
        assert_eq!(
            DemoError::Storefront(StorefrontError::EmptyCart).code(),
            1
        );
    }

    #[test]
    fn test_messages() {
        let err = DemoError::Timeout { what: "sync", seconds: 5 };
        assert_eq!(err.to_string(), "timed out after 5s waiting for sync");
        let err = DemoError::Storefront(StorefrontError::EmptyCart);
        assert_eq!(err.to_string(), "Your cart is empty!");
    }
}
