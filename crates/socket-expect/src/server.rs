//! Message-buffering mock WebSocket server.

use crate::codec::{Message, MessageCodec};
use crate::config::ServerOptions;
use crate::registry::ServerRegistry;
use crate::result::{SocketError, SocketResult};
use crate::signal::OneShot;
use crate::websocket::{lock, CloseOptions, Listener, Peer};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

/// Arrival-ordered record of decoded frames.
///
/// Every message pushed to `pending` was pushed to `history` first, in the
/// same order; only `pending` is ever consumed.
#[derive(Debug, Default)]
struct MessageLog {
    history: Vec<Message>,
    pending: VecDeque<Message>,
}

struct ServerShared {
    id: Uuid,
    url: String,
    codec: MessageCodec,
    listener: Listener,
    log: Mutex<MessageLog>,
    connected: OneShot<Peer>,
    closed: OneShot<Peer>,
    message_added: OneShot<()>,
}

impl ServerShared {
    fn buffer(&self, frame: &str) {
        let message = self.codec.decode(frame);
        let mut log = lock(&self.log);
        trace!(url = %self.url, seq = log.history.len(), json = message.is_json(), "frame buffered");
        log.history.push(message.clone());
        log.pending.push_back(message);
        // Resolved under the log lock so a consumer cannot observe an empty
        // queue and then take the following generation's waiter.
        self.message_added.resolve_and_rearm(());
    }
}

/// A mock WebSocket server that records every message its clients send.
///
/// Cloning yields another handle to the same server.
///
/// ```ignore
/// let registry = ServerRegistry::new();
/// let server = MessageServer::bind(&registry, "ws://localhost:1234", ServerOptions::json())?;
/// let client = MockClient::connect(registry.network(), "ws://localhost:1234")?;
/// server.connected().await?;
///
/// client.send(r#"{"type":"GREETING"}"#)?;
/// assert_eq!(server.next_message().await, Message::from(json!({"type": "GREETING"})));
/// ```
#[derive(Clone)]
pub struct MessageServer {
    shared: Arc<ServerShared>,
}

impl fmt::Debug for MessageServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = lock(&self.shared.log);
        f.debug_struct("MessageServer")
            .field("id", &self.shared.id)
            .field("url", &self.shared.url)
            .field("json_protocol", &self.shared.codec.json_protocol())
            .field("messages", &log.history.len())
            .field("pending", &log.pending.len())
            .finish()
    }
}

impl PartialEq for MessageServer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl MessageServer {
    /// Start a plain-text server on `url` in the global registry
    pub fn new(url: &str) -> SocketResult<Self> {
        Self::with_options(url, ServerOptions::default())
    }

    /// Start a server on `url` in the global registry
    pub fn with_options(url: &str, options: ServerOptions) -> SocketResult<Self> {
        Self::bind(ServerRegistry::global(), url, options)
    }

    /// Start a server on `url` in `registry`, listening on its network
    pub fn bind(registry: &ServerRegistry, url: &str, options: ServerOptions) -> SocketResult<Self> {
        let listener = registry.network().listen(url, options.listener.clone())?;
        let shared = Arc::new(ServerShared {
            id: Uuid::new_v4(),
            url: listener.url().to_string(),
            codec: MessageCodec::new(options.json_protocol),
            listener,
            log: Mutex::new(MessageLog::default()),
            connected: OneShot::new(),
            closed: OneShot::new(),
            message_added: OneShot::new(),
        });
        Self::wire(&shared);

        let server = Self { shared };
        registry.register(server.clone());
        debug!(
            id = %server.shared.id,
            url = %server.shared.url,
            json = options.json_protocol,
            "message server started"
        );
        Ok(server)
    }

    fn wire(shared: &Arc<ServerShared>) {
        let weak = Arc::downgrade(shared);
        shared.listener.on_connection(move |peer| {
            let Some(server) = weak.upgrade() else {
                return;
            };
            server.connected.resolve_and_rearm(peer.clone());

            let frames: Weak<ServerShared> = Weak::clone(&weak);
            peer.on_message(move |frame| {
                if let Some(server) = frames.upgrade() {
                    server.buffer(frame);
                }
            });
        });

        let weak = Arc::downgrade(shared);
        shared.listener.on_close(move |peer| {
            if let Some(server) = weak.upgrade() {
                server.closed.resolve_and_rearm(peer.clone());
            }
        });
    }

    /// Global registry's live servers, in creation order
    #[must_use]
    pub fn clients() -> Vec<Self> {
        ServerRegistry::global().servers()
    }

    /// Reset every server in the global registry
    pub fn clean() {
        ServerRegistry::global().reset_all();
    }

    /// Identity token assigned at construction
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Normalized listen address
    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Whether frames are encoded and decoded as JSON
    #[must_use]
    pub fn json_protocol(&self) -> bool {
        self.shared.codec.json_protocol()
    }

    /// Wait for the next client to complete its handshake.
    ///
    /// The returned future is bound to the next connection at call time, so
    /// it may be created before the event it waits for.
    pub fn connected(&self) -> impl Future<Output = SocketResult<Peer>> + Send + 'static {
        let waiter = self.shared.connected.wait();
        let url = self.shared.url.clone();
        async move { waiter.await.ok_or(SocketError::ServerDropped { url }) }
    }

    /// Wait for the next connection to close
    pub fn closed(&self) -> impl Future<Output = SocketResult<Peer>> + Send + 'static {
        let waiter = self.shared.closed.wait();
        let url = self.shared.url.clone();
        async move { waiter.await.ok_or(SocketError::ServerDropped { url }) }
    }

    /// Take the oldest unconsumed message, waiting for one if none is queued.
    ///
    /// Never completes if no further message arrives; race it against a
    /// deadline (see [`race_next_message`](crate::race_next_message)).
    /// Dropping the future before it completes loses nothing.
    pub async fn next_message(&self) -> Message {
        loop {
            let waiter = {
                let mut log = lock(&self.shared.log);
                if let Some(message) = log.pending.pop_front() {
                    return message;
                }
                self.shared.message_added.wait()
            };
            // `None` would mean the signal was dropped, which cannot happen
            // while `self` is borrowed.
            let _ = waiter.await;
        }
    }

    /// Every message received so far, in arrival order
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.shared.log).history.clone()
    }

    /// Number of messages not yet taken by [`next_message`](Self::next_message)
    #[must_use]
    pub fn pending_len(&self) -> usize {
        lock(&self.shared.log).pending.len()
    }

    /// Open connections
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.shared.listener.peers()
    }

    /// Check if the server was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.listener.is_closed()
    }

    /// Run `callback` for every accepted client, after the server's own wiring
    pub fn on_connection<F>(&self, callback: F)
    where
        F: Fn(&Peer) + Send + Sync + 'static,
    {
        self.shared.listener.on_connection(callback);
    }

    /// Run `callback` with the raw text of every frame from clients that
    /// connect after this call
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.shared.listener.on_connection(move |peer| {
            let callback = Arc::clone(&callback);
            peer.on_message(move |frame| callback(frame));
        });
    }

    /// Run `callback` whenever a connection closes
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn(&Peer) + Send + Sync + 'static,
    {
        self.shared.listener.on_close(callback);
    }

    /// Encode `message` and send it to every open client
    pub fn send(&self, message: impl Into<Message>) {
        let frame = self.shared.codec.encode(&message.into());
        trace!(url = %self.shared.url, len = frame.len(), "broadcast");
        self.shared.listener.broadcast(&frame);
    }

    /// Close every connection normally and release the address
    pub fn close(&self) {
        self.close_with(CloseOptions::default());
    }

    /// Close every connection with `options` and release the address
    pub fn close_with(&self, options: CloseOptions) {
        self.shared.listener.close(options);
    }

    /// Raise an error on every client, then close normally
    pub fn error(&self) {
        self.error_with(CloseOptions::default());
    }

    /// Raise an error on every client, then close with `options`
    pub fn error_with(&self, options: CloseOptions) {
        self.shared.listener.emit_error();
        self.shared.listener.close(options);
    }

    /// Close the server and forget every message
    pub(crate) fn reset(&self) {
        self.close();
        let mut log = lock(&self.shared.log);
        log.history.clear();
        log.pending.clear();
    }
}
