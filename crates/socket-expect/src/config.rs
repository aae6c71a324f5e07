//! Configuration for mock servers and matchers.

use crate::result::{SocketError, SocketResult};
use crate::websocket::{ClientInfo, ListenerOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default deadline for blocking matchers (1 second)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 1_000;

/// Environment variable overriding [`DEFAULT_WAIT_TIMEOUT_MS`]
pub const TIMEOUT_ENV_VAR: &str = "SOCKET_EXPECT_TIMEOUT_MS";

// =============================================================================
// MATCHER OPTIONS
// =============================================================================

/// Options accepted by the asynchronous matchers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherOptions {
    /// Deadline in milliseconds; `None` means [`DEFAULT_WAIT_TIMEOUT_MS`]
    pub timeout_ms: Option<u64>,
    /// Only require the expected messages to be present somewhere in history
    pub partial: bool,
}

impl MatcherOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the default deadline from `SOCKET_EXPECT_TIMEOUT_MS`.
    ///
    /// An unset variable yields the plain defaults.
    pub fn from_env() -> SocketResult<Self> {
        match std::env::var(TIMEOUT_ENV_VAR) {
            Ok(raw) => Self::parse_timeout(&raw).map(|ms| Self::new().with_timeout(ms)),
            Err(_) => Ok(Self::new()),
        }
    }

    fn parse_timeout(raw: &str) -> SocketResult<u64> {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| SocketError::InvalidOptions {
                message: format!("{TIMEOUT_ENV_VAR}={raw:?} is not a millisecond count: {e}"),
            })
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Enable partial matching
    #[must_use]
    pub const fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Effective deadline in milliseconds
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        match self.timeout_ms {
            Some(ms) => ms,
            None => DEFAULT_WAIT_TIMEOUT_MS,
        }
    }

    /// Effective deadline as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }
}

// =============================================================================
// SERVER OPTIONS
// =============================================================================

/// Options chosen when a [`MessageServer`](crate::MessageServer) is constructed
#[derive(Clone, Default)]
pub struct ServerOptions {
    /// Serialize outbound and parse inbound frames as JSON
    pub json_protocol: bool,
    /// Handshake hooks forwarded to the mock listener
    pub listener: ListenerOptions,
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("json_protocol", &self.json_protocol)
            .field("listener", &self.listener)
            .finish()
    }
}

impl ServerOptions {
    /// Create options with defaults (plain text protocol)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for options with the JSON protocol enabled
    #[must_use]
    pub fn json() -> Self {
        Self::new().with_json_protocol(true)
    }

    /// Toggle the JSON protocol
    #[must_use]
    pub fn with_json_protocol(mut self, enabled: bool) -> Self {
        self.json_protocol = enabled;
        self
    }

    /// Refuse clients for which `verify` returns false
    #[must_use]
    pub fn with_verify_client<F>(mut self, verify: F) -> Self
    where
        F: Fn(&ClientInfo) -> bool + Send + Sync + 'static,
    {
        self.listener = self.listener.with_verify_client(verify);
        self
    }

    /// Pick a subprotocol from the client's offer; `None` refuses the client
    #[must_use]
    pub fn with_select_protocol<F>(mut self, select: F) -> Self
    where
        F: Fn(&[String]) -> Option<String> + Send + Sync + 'static,
    {
        self.listener = self.listener.with_select_protocol(select);
        self
    }
}
