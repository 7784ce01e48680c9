//! Error types for crash reporting
//!
//! None of these ever reach the code whose panic is being reported: the
//! reporter logs them and carries on re-raising the original panic.

use thiserror::Error;

/// Errors raised while preparing or submitting a crash report
#[derive(Debug, Error)]
pub enum ReportError {
    /// The configured endpoint URL cannot be turned into a store URL
    #[error("Invalid crash reporting endpoint: {0}")]
    InvalidEndpoint(String),

    /// The transport refused the packet
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The live transport's worker could not be started
    #[error("Failed to start crash reporting worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Errors returned by a [`Transport`](crate::transport::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// The background sender has shut down and accepts no more packets
    #[error("Crash report transport is closed")]
    Closed,

    /// The packet could not be serialized
    #[error("Failed to encode crash report: {0}")]
    Encode(#[from] serde_json::Error),

    /// The HTTP request failed or the endpoint answered with an error status
    #[error("Crash report delivery failed: {0}")]
    Http(#[from] reqwest::Error),
}
