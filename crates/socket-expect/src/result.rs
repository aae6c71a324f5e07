//! Result and error types for socket-expect.

use thiserror::Error;

/// Result type for socket-expect operations
pub type SocketResult<T> = Result<T, SocketError>;

/// Errors that can occur while driving the mock transport or asserting on it
#[derive(Debug, Error)]
pub enum SocketError {
    /// A mock listener is already bound to the address
    #[error("A mock server is already listening on {url}")]
    AddressInUse {
        /// Address that was requested
        url: String,
    },

    /// No mock listener accepts connections on the address
    #[error("Connection to {url} refused: {message}")]
    ConnectionRefused {
        /// Address that was dialed
        url: String,
        /// Error message
        message: String,
    },

    /// Frame sent on a socket that is not open
    #[error("Socket {id} is not open (state: {state})")]
    NotOpen {
        /// Socket ID
        id: String,
        /// Ready state at the time of the send
        state: String,
    },

    /// The server behind a pending signal went away
    #[error("Server {url} was dropped while a waiter was pending")]
    ServerDropped {
        /// Server address
        url: String,
    },

    /// Invalid options
    #[error("Invalid options: {message}")]
    InvalidOptions {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Assertion failed (from `expect()`)
    #[error("{message}")]
    AssertionFailed {
        /// Rendered failure report
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SocketError {
    /// Check if this error is an assertion failure rather than a fault
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }
}
