//! socket-expect: assertions about messages sent over a mocked WebSocket.
//!
//! A [`MessageServer`] listens on an in-memory [`MockNetwork`], records every
//! frame its [`MockClient`]s send, and hands them out in arrival order. The
//! matchers reached through [`expect`] make claims about those messages.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  frames   ┌───────────────┐  history / queue  ┌────────────┐
//! │ MockClient │──────────►│ MessageServer │──────────────────►│  matchers  │
//! │            │◄──────────│  (+ codec)    │                   │  (expect)  │
//! └────────────┘  events   └───────────────┘                   └────────────┘
//!                                 │                                  │
//!                          ServerRegistry                   Verdict → report
//! ```
//!
//! # Example
//!
//! ```ignore
//! use socket_expect::{expect, MessageServer, MockClient, ServerOptions, ServerRegistry};
//!
//! #[tokio::test]
//! async fn greets_the_server() -> socket_expect::SocketResult<()> {
//!     let registry = ServerRegistry::new();
//!     let server = MessageServer::bind(&registry, "ws://localhost:1234", ServerOptions::json())?;
//!     let client = MockClient::connect(registry.network(), "ws://localhost:1234")?;
//!     server.connected().await?;
//!
//!     client.send(r#"{"type":"GREETING","payload":"hello"}"#)?;
//!     expect(&server)
//!         .to_receive_message(serde_json::json!({"type": "GREETING", "payload": "hello"}))
//!         .await?;
//!
//!     registry.reset_all();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assertion;
mod codec;
mod config;
mod expect;
pub mod logging;
pub mod matchers;
mod registry;
mod result;
mod server;
mod signal;
pub mod wait;
pub mod websocket;

pub use assertion::{report, FailureReport, MatcherName, MatcherState, Verdict};
pub use codec::{Message, MessageCodec};
pub use config::{MatcherOptions, ServerOptions, DEFAULT_WAIT_TIMEOUT_MS, TIMEOUT_ENV_VAR};
pub use expect::{expect, Expect};
pub use registry::ServerRegistry;
pub use result::{SocketError, SocketResult};
pub use server::MessageServer;
pub use signal::{OneShot, SignalFuture};
pub use wait::{drain_all, race_next_message, within, Race};
pub use websocket::{
    ClientEvent, ClientInfo, CloseOptions, Listener, ListenerOptions, MockClient, MockNetwork,
    Peer, ReadyState, CLOSE_NORMAL,
};
