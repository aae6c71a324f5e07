//! Registry of live mock servers.
//!
//! Every [`MessageServer`] joins the registry it was bound in. The process-wide
//! [`ServerRegistry::global`] backs the `MessageServer::new` shorthand; tests
//! that run in parallel should bind into their own registry instead.

use crate::server::MessageServer;
use crate::websocket::{lock, MockNetwork};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

/// Live servers plus the mock network they listen on
#[derive(Debug, Default)]
pub struct ServerRegistry {
    network: MockNetwork,
    servers: Mutex<Vec<MessageServer>>,
}

impl ServerRegistry {
    /// Create an empty registry with its own network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry sharing `network`
    #[must_use]
    pub fn with_network(network: MockNetwork) -> Self {
        Self {
            network,
            servers: Mutex::new(Vec::new()),
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<ServerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Network that servers in this registry listen on
    #[must_use]
    pub const fn network(&self) -> &MockNetwork {
        &self.network
    }

    pub(crate) fn register(&self, server: MessageServer) {
        lock(&self.servers).push(server);
    }

    /// Registered servers, in creation order
    #[must_use]
    pub fn servers(&self) -> Vec<MessageServer> {
        lock(&self.servers).clone()
    }

    /// Number of registered servers
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.servers).len()
    }

    /// Check if no server is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.servers).is_empty()
    }

    /// Close every server, forget its messages and empty the registry.
    ///
    /// Safe to call repeatedly.
    pub fn reset_all(&self) {
        let servers = std::mem::take(&mut *lock(&self.servers));
        for server in &servers {
            server.reset();
        }
        debug!(count = servers.len(), "mock servers reset");
    }
}
