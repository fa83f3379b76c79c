//! Storefront error types.

use techstore_worker::{NetworkError, StoreError, WorkerError};

#[derive(thiserror::Error, Debug)]
pub enum StorefrontError {
    #[error("no product with id {0}")]
    UnknownItem(u32),

    #[error("Your cart is empty!")]
    EmptyCart,

    /// The fetch could not be answered by the worker or the network.
    #[error("failed to fetch {url}")]
    FetchFailed { url: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
