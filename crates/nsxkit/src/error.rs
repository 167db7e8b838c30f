//! Error types for transport operations.
//!
//! Only failures that prevent a response from being obtained at all are
//! errors here. HTTP status codes, including 4xx and 5xx, are returned as
//! ordinary [`Response`](crate::Response) values so callers keep the raw body.

use std::fmt;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the configuration API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response.
    #[error("{method} {path}: {message}")]
    Network {
        /// HTTP method of the failed request.
        method: String,
        /// Request path.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request body could not be encoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a network error for a request.
    pub fn network(method: impl fmt::Display, path: &str, message: impl Into<String>) -> Self {
        Self::Network {
            method: method.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_display() {
        let err = Error::network("GET", "/api/2.0/services/ipset/scope/g-0", "connection refused");
        let display = err.to_string();
        assert!(display.contains("GET"));
        assert!(display.contains("/api/2.0/services/ipset/scope/g-0"));
        assert!(display.contains("connection refused"));
    }
}
