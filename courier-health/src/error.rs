//! Health server error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    /// Failed to bind to the configured address
    #[error("Failed to bind health server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    #[error("Health server error: {0}")]
    ServerError(String),
}
