//! Gateway error classification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The aggregator answered with a non-success status.
    #[error("upstream returned status {status}")]
    Upstream {
        status: u16,
        /// Upstream body: JSON when it parsed, otherwise the raw text.
        body: serde_json::Value,
    },

    /// Network failure or timeout before a response arrived.
    #[error("{0}")]
    Connect(String),

    /// A success response whose body could not be read or decoded.
    #[error("invalid upstream response: {0}")]
    Decode(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
