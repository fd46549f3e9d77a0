//! Error types for the Supabase API client.

use thiserror::Error;

/// Errors raised by the Supabase API client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SupabaseError {
    /// Raised when the client is built from incomplete credentials.
    #[error("supabase configuration error: {0}")]
    Config(String),
    /// Raised when a request cannot be sent or times out.
    #[error("request to {url} failed: {message}")]
    Http {
        /// Endpoint that was requested.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{url} returned status {status}: {message}")]
    Api {
        /// Endpoint that was requested.
        url: String,
        /// HTTP status code of the response.
        status: u16,
        /// Response body, as returned by the API.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Endpoint that was requested.
        url: String,
        /// Decoder error message.
        message: String,
    },
}
