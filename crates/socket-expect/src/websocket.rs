//! In-memory WebSocket transport.
//!
//! A [`MockNetwork`] maps addresses to [`Listener`]s. A [`MockClient`] dials an
//! address; the handshake completes on a spawned task, the way a browser
//! socket opens asynchronously after construction. Once open, frames flow
//! synchronously: [`MockClient::send`] runs the server-side frame callbacks
//! before it returns, and [`Peer::send`] queues a [`ClientEvent`] the client
//! reads with [`MockClient::next_event`].
//!
//! Callbacks are never invoked while an internal lock is held, so a callback
//! may freely call back into the transport (e.g. close the peer it was handed).

use crate::result::{SocketError, SocketResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Normal closure status code
pub const CLOSE_NORMAL: u16 = 1000;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `ws://host:port` and `ws://host:port/` name the same listener
fn normalize_url(url: &str) -> String {
    let authority_start = url.find("://").map_or(0, |i| i + 3);
    if url[authority_start..].contains('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

// =============================================================================
// SHARED TYPES
// =============================================================================

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    /// Handshake not yet completed
    Connecting,
    /// Connection is open
    Open,
    /// Connection is closing
    Closing,
    /// Connection is closed
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// Close frame parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOptions {
    /// Close status code
    pub code: u16,
    /// Close reason
    pub reason: String,
    /// Whether the close handshake completed cleanly
    pub was_clean: bool,
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: String::new(),
            was_clean: true,
        }
    }
}

impl CloseOptions {
    /// Create close options with a code and reason
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    /// Set whether the close was clean
    #[must_use]
    pub const fn with_clean(mut self, was_clean: bool) -> Self {
        self.was_clean = was_clean;
        self
    }

    fn refused() -> Self {
        Self::default().with_clean(false)
    }
}

/// Event observed by a [`MockClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Handshake completed
    Open {
        /// Negotiated subprotocol
        protocol: Option<String>,
    },
    /// Frame sent by the server
    Message(String),
    /// Error raised by the server or by a refused handshake
    Error {
        /// Address of the listener that raised it
        origin: String,
    },
    /// Connection closed
    Close(CloseOptions),
}

/// What a listener learns about a client during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Address the client dialed
    pub url: String,
    /// Subprotocols offered by the client
    pub protocols: Vec<String>,
}

type VerifyClient = Arc<dyn Fn(&ClientInfo) -> bool + Send + Sync>;
type SelectProtocol = Arc<dyn Fn(&[String]) -> Option<String> + Send + Sync>;
type PeerCallback = Arc<dyn Fn(&Peer) + Send + Sync>;
type FrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handshake hooks for a [`Listener`]
#[derive(Clone, Default)]
pub struct ListenerOptions {
    /// Refuse clients for which this returns false
    pub verify_client: Option<VerifyClient>,
    /// Choose a subprotocol from the client's offer; `None` refuses the client
    pub select_protocol: Option<SelectProtocol>,
}

impl fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("verify_client", &self.verify_client.is_some())
            .field("select_protocol", &self.select_protocol.is_some())
            .finish()
    }
}

impl ListenerOptions {
    /// Create options without hooks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client verification hook
    #[must_use]
    pub fn with_verify_client<F>(mut self, verify: F) -> Self
    where
        F: Fn(&ClientInfo) -> bool + Send + Sync + 'static,
    {
        self.verify_client = Some(Arc::new(verify));
        self
    }

    /// Set the subprotocol selection hook
    #[must_use]
    pub fn with_select_protocol<F>(mut self, select: F) -> Self
    where
        F: Fn(&[String]) -> Option<String> + Send + Sync + 'static,
    {
        self.select_protocol = Some(Arc::new(select));
        self
    }
}

// =============================================================================
// NETWORK
// =============================================================================

#[derive(Default)]
struct NetworkInner {
    listeners: Mutex<HashMap<String, Weak<ListenerShared>>>,
    connection_counter: AtomicU64,
}

/// Address space shared by mock listeners and clients
#[derive(Clone, Default)]
pub struct MockNetwork {
    inner: Arc<NetworkInner>,
}

impl fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners: Vec<String> = lock(&self.inner.listeners).keys().cloned().collect();
        f.debug_struct("MockNetwork")
            .field("listeners", &listeners)
            .finish()
    }
}

impl MockNetwork {
    /// Create an empty network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener to `url`
    pub fn listen(&self, url: &str, options: ListenerOptions) -> SocketResult<Listener> {
        let url = normalize_url(url);
        let mut listeners = lock(&self.inner.listeners);
        if listeners
            .get(&url)
            .and_then(Weak::upgrade)
            .is_some_and(|l| !l.is_closed())
        {
            return Err(SocketError::AddressInUse { url });
        }

        let shared = Arc::new(ListenerShared {
            url: url.clone(),
            options,
            network: Arc::downgrade(&self.inner),
            state: Mutex::new(ListenerState::default()),
        });
        listeners.insert(url.clone(), Arc::downgrade(&shared));
        debug!(url = %url, "mock listener bound");
        Ok(Listener { shared })
    }

    /// Check if a listener accepts connections on `url`
    #[must_use]
    pub fn is_listening(&self, url: &str) -> bool {
        self.lookup(&normalize_url(url)).is_some()
    }

    fn lookup(&self, url: &str) -> Option<Arc<ListenerShared>> {
        lock(&self.inner.listeners)
            .get(url)
            .and_then(Weak::upgrade)
            .filter(|l| !l.is_closed())
    }

    fn next_connection_id(&self) -> String {
        let n = self.inner.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ws_{n}")
    }
}

// =============================================================================
// LISTENER
// =============================================================================

#[derive(Default)]
struct ListenerState {
    closed: bool,
    peers: Vec<Peer>,
    on_connection: Vec<PeerCallback>,
    on_close: Vec<PeerCallback>,
}

struct ListenerShared {
    url: String,
    options: ListenerOptions,
    network: Weak<NetworkInner>,
    state: Mutex<ListenerState>,
}

impl ListenerShared {
    fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn accept(self: &Arc<Self>, peer: Peer, info: ClientInfo) {
        if peer.ready_state() != ReadyState::Connecting {
            return;
        }
        if self.is_closed() {
            self.refuse(&peer, "listener closed");
            return;
        }
        if let Some(verify) = &self.options.verify_client {
            if !verify(&info) {
                self.refuse(&peer, "verify_client rejected the client");
                return;
            }
        }

        let protocol = match (&self.options.select_protocol, info.protocols.first()) {
            (_, None) => None,
            (Some(select), Some(_)) => match select(&info.protocols) {
                Some(protocol) => Some(protocol),
                None => {
                    self.refuse(&peer, "select_protocol rejected every offered protocol");
                    return;
                }
            },
            (None, Some(first)) => Some(first.clone()),
        };

        {
            let mut state = lock(&peer.shared.state);
            state.ready = ReadyState::Open;
            state.protocol.clone_from(&protocol);
        }
        peer.notify(ClientEvent::Open { protocol });

        let callbacks = {
            let mut state = lock(&self.state);
            state.peers.push(peer.clone());
            state.on_connection.clone()
        };
        debug!(url = %self.url, peer = %peer.id(), "mock connection accepted");
        for callback in callbacks {
            callback(&peer);
        }
    }

    fn refuse(&self, peer: &Peer, why: &str) {
        debug!(url = %self.url, peer = %peer.id(), why, "mock connection refused");
        lock(&peer.shared.state).ready = ReadyState::Closed;
        peer.notify(ClientEvent::Error {
            origin: self.url.clone(),
        });
        peer.notify(ClientEvent::Close(CloseOptions::refused()));
    }

    fn detach(&self, peer: &Peer) {
        let callbacks = {
            let mut state = lock(&self.state);
            state.peers.retain(|p| p != peer);
            state.on_close.clone()
        };
        for callback in callbacks {
            callback(peer);
        }
    }

    fn unbind(self: &Arc<Self>) {
        if let Some(network) = self.network.upgrade() {
            let mut listeners = lock(&network.listeners);
            let ours = listeners
                .get(&self.url)
                .is_some_and(|w| Weak::ptr_eq(w, &Arc::downgrade(self)));
            if ours {
                listeners.remove(&self.url);
            }
        }
    }
}

/// Server side of the mock transport, bound to one address
#[derive(Clone)]
pub struct Listener {
    shared: Arc<ListenerShared>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("url", &self.shared.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Listener {
    /// Normalized address this listener is bound to
    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Check if the listener was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Run `callback` for every accepted client
    pub fn on_connection<F>(&self, callback: F)
    where
        F: Fn(&Peer) + Send + Sync + 'static,
    {
        lock(&self.shared.state).on_connection.push(Arc::new(callback));
    }

    /// Run `callback` whenever a connected client closes, whoever initiated it
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn(&Peer) + Send + Sync + 'static,
    {
        lock(&self.shared.state).on_close.push(Arc::new(callback));
    }

    /// Currently open peers
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        lock(&self.shared.state).peers.clone()
    }

    /// Send a frame to every open peer
    pub fn broadcast(&self, frame: &str) {
        for peer in self.peers() {
            // A peer closing concurrently is not an error for a broadcast.
            let _ = peer.send(frame);
        }
    }

    /// Raise an error event on every open peer
    pub fn emit_error(&self) {
        for peer in self.peers() {
            peer.notify(ClientEvent::Error {
                origin: self.shared.url.clone(),
            });
        }
    }

    /// Close every peer with `options` and release the address
    pub fn close(&self, options: CloseOptions) {
        let peers = {
            let mut state = lock(&self.shared.state);
            state.closed = true;
            state.peers.clone()
        };
        self.shared.unbind();
        debug!(url = %self.shared.url, peers = peers.len(), "mock listener closed");
        for peer in peers {
            peer.close(options.clone());
        }
    }
}

// =============================================================================
// PEER
// =============================================================================

struct PeerState {
    ready: ReadyState,
    protocol: Option<String>,
    on_message: Vec<FrameCallback>,
}

struct PeerShared {
    id: String,
    url: String,
    listener: Weak<ListenerShared>,
    to_client: mpsc::UnboundedSender<ClientEvent>,
    state: Mutex<PeerState>,
}

/// Server-side handle to one client connection
#[derive(Clone)]
pub struct Peer {
    shared: Arc<PeerShared>,
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.shared.id)
            .field("url", &self.shared.url)
            .field("state", &self.ready_state())
            .finish()
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Peer {}

impl Peer {
    /// Connection ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Address the client dialed
    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Current ready state
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        lock(&self.shared.state).ready
    }

    /// Negotiated subprotocol
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        lock(&self.shared.state).protocol.clone()
    }

    /// Check if the connection is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Run `callback` for every frame this client sends
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        lock(&self.shared.state).on_message.push(Arc::new(callback));
    }

    /// Send a frame to the client
    pub fn send(&self, frame: &str) -> SocketResult<()> {
        self.ensure_open()?;
        trace!(peer = %self.id(), len = frame.len(), "server frame");
        self.notify(ClientEvent::Message(frame.to_string()));
        Ok(())
    }

    /// Close the connection. No-op if already closed.
    pub fn close(&self, options: CloseOptions) {
        let was_open = {
            let mut state = lock(&self.shared.state);
            if matches!(state.ready, ReadyState::Closing | ReadyState::Closed) {
                return;
            }
            let was_open = state.ready == ReadyState::Open;
            state.ready = ReadyState::Closing;
            was_open
        };
        debug!(peer = %self.id(), code = options.code, was_open, "mock connection closing");
        self.notify(ClientEvent::Close(options));
        lock(&self.shared.state).ready = ReadyState::Closed;
        // A connection the listener never accepted has nothing to detach.
        if !was_open {
            return;
        }
        if let Some(listener) = self.shared.listener.upgrade() {
            listener.detach(self);
        }
    }

    fn ensure_open(&self) -> SocketResult<()> {
        let state = self.ready_state();
        if state == ReadyState::Open {
            Ok(())
        } else {
            Err(SocketError::NotOpen {
                id: self.shared.id.clone(),
                state: state.to_string(),
            })
        }
    }

    fn notify(&self, event: ClientEvent) {
        // The client may have been dropped; the event is simply lost then.
        let _ = self.shared.to_client.send(event);
    }

    fn deliver(&self, frame: &str) {
        let callbacks = lock(&self.shared.state).on_message.clone();
        for callback in callbacks {
            callback(frame);
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Client side of a mock connection
#[derive(Debug)]
pub struct MockClient {
    peer: Peer,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl MockClient {
    /// Dial `url` on `network`.
    ///
    /// The handshake completes on a spawned task, so this must run inside a
    /// tokio runtime.
    pub fn connect(network: &MockNetwork, url: &str) -> SocketResult<Self> {
        Self::connect_with_protocols(network, url, &[])
    }

    /// Dial `url` offering subprotocols
    pub fn connect_with_protocols(
        network: &MockNetwork,
        url: &str,
        protocols: &[&str],
    ) -> SocketResult<Self> {
        let url = normalize_url(url);
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| SocketError::ConnectionRefused {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let listener = network
            .lookup(&url)
            .ok_or_else(|| SocketError::ConnectionRefused {
                url: url.clone(),
                message: "no mock server is listening".to_string(),
            })?;

        let (to_client, events) = mpsc::unbounded_channel();
        let peer = Peer {
            shared: Arc::new(PeerShared {
                id: network.next_connection_id(),
                url: url.clone(),
                listener: Arc::downgrade(&listener),
                to_client,
                state: Mutex::new(PeerState {
                    ready: ReadyState::Connecting,
                    protocol: None,
                    on_message: Vec::new(),
                }),
            }),
        };

        let info = ClientInfo {
            url,
            protocols: protocols.iter().map(|p| (*p).to_string()).collect(),
        };
        let handshake = peer.clone();
        runtime.spawn(async move { listener.accept(handshake, info) });

        Ok(Self { peer, events })
    }

    /// Connection ID, shared with the server-side [`Peer`]
    #[must_use]
    pub fn id(&self) -> &str {
        self.peer.id()
    }

    /// Address this client dialed
    #[must_use]
    pub fn url(&self) -> &str {
        self.peer.url()
    }

    /// Current ready state
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.peer.ready_state()
    }

    /// Negotiated subprotocol
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        self.peer.protocol()
    }

    /// Send a text frame to the server
    pub fn send(&self, frame: impl Into<String>) -> SocketResult<()> {
        let frame = frame.into();
        self.peer.ensure_open()?;
        trace!(peer = %self.id(), len = frame.len(), "client frame");
        self.peer.deliver(&frame);
        Ok(())
    }

    /// Serialize `value` as JSON and send it
    pub fn send_json<T: Serialize>(&self, value: &T) -> SocketResult<()> {
        let frame = serde_json::to_string(value)?;
        self.send(frame)
    }

    /// Close the connection normally
    pub fn close(&self) {
        self.peer.close(CloseOptions::default());
    }

    /// Close the connection with explicit options
    pub fn close_with(&self, options: CloseOptions) {
        self.peer.close(options);
    }

    /// Wait for the next event. Pending forever if nothing else happens.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<ClientEvent> {
        self.events.try_recv().ok()
    }

    /// Take every queued event
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        std::iter::from_fn(|| self.try_next_event()).collect()
    }

    /// Take every queued event and keep the message frames
    pub fn received_messages(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Message(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }
}

impl Drop for MockClient {
    /// Dropping a client tears the connection down uncleanly.
    fn drop(&mut self) {
        self.peer.close(CloseOptions::default().with_clean(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const URL: &str = "ws://localhost:1234";

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_normalize_appends_slash() {
            assert_eq!(normalize_url("ws://localhost:1234"), "ws://localhost:1234/");
            assert_eq!(normalize_url("ws://localhost:1234/"), "ws://localhost:1234/");
            assert_eq!(normalize_url("ws://host/chat"), "ws://host/chat");
        }
    }

    mod close_options_tests {
        use super::*;

        #[test]
        fn test_default() {
            let options = CloseOptions::default();
            assert_eq!(options.code, CLOSE_NORMAL);
            assert!(options.reason.is_empty());
            assert!(options.was_clean);
        }

        #[test]
        fn test_custom() {
            let options = CloseOptions::new(1234, "boom").with_clean(false);
            assert_eq!(options.code, 1234);
            assert_eq!(options.reason, "boom");
            assert!(!options.was_clean);
        }
    }

    mod network_tests {
        use super::*;

        #[test]
        fn test_listen_twice_is_address_in_use() {
            let network = MockNetwork::new();
            let _first = network.listen(URL, ListenerOptions::new()).unwrap();
            let err = network.listen(URL, ListenerOptions::new()).unwrap_err();
            assert!(matches!(err, SocketError::AddressInUse { .. }));
        }

        #[test]
        fn test_close_releases_address() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            assert!(network.is_listening(URL));
            listener.close(CloseOptions::default());
            assert!(!network.is_listening(URL));
            assert!(network.listen(URL, ListenerOptions::new()).is_ok());
        }

        #[test]
        fn test_drop_releases_address() {
            let network = MockNetwork::new();
            drop(network.listen(URL, ListenerOptions::new()).unwrap());
            assert!(!network.is_listening(URL));
        }

        #[tokio::test]
        async fn test_connect_to_unbound_address_is_refused() {
            let network = MockNetwork::new();
            let err = MockClient::connect(&network, URL).unwrap_err();
            assert!(matches!(err, SocketError::ConnectionRefused { .. }));
        }
    }

    mod handshake_tests {
        use super::*;

        #[tokio::test]
        async fn test_handshake_is_deferred() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let mut client = MockClient::connect(&network, URL).unwrap();
            assert_eq!(client.ready_state(), ReadyState::Connecting);

            settle().await;
            assert_eq!(client.ready_state(), ReadyState::Open);
            assert_eq!(listener.peers().len(), 1);
            assert_eq!(
                client.try_next_event(),
                Some(ClientEvent::Open { protocol: None })
            );
        }

        #[tokio::test]
        async fn test_verify_client_refuses() {
            let network = MockNetwork::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let listener = network
                .listen(
                    URL,
                    ListenerOptions::new().with_verify_client(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        false
                    }),
                )
                .unwrap();
            let mut client = MockClient::connect(&network, URL).unwrap();
            settle().await;

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(listener.peers().is_empty());
            assert_eq!(client.ready_state(), ReadyState::Closed);
            let events = client.drain_events();
            assert_eq!(
                events,
                vec![
                    ClientEvent::Error {
                        origin: "ws://localhost:1234/".to_string()
                    },
                    ClientEvent::Close(CloseOptions::default().with_clean(false)),
                ]
            );
        }

        #[tokio::test]
        async fn test_select_protocol() {
            let network = MockNetwork::new();
            let _listener = network
                .listen(
                    URL,
                    ListenerOptions::new()
                        .with_select_protocol(|offered| offered.last().cloned()),
                )
                .unwrap();
            let client = MockClient::connect_with_protocols(&network, URL, &["a", "b"]).unwrap();
            settle().await;
            assert_eq!(client.protocol(), Some("b".to_string()));
        }

        #[tokio::test]
        async fn test_select_protocol_refuses() {
            let network = MockNetwork::new();
            let _listener = network
                .listen(URL, ListenerOptions::new().with_select_protocol(|_| None))
                .unwrap();
            let mut client = MockClient::connect_with_protocols(&network, URL, &["foo"]).unwrap();
            settle().await;
            assert_eq!(client.ready_state(), ReadyState::Closed);
            assert!(matches!(
                client.try_next_event(),
                Some(ClientEvent::Error { .. })
            ));
        }

        #[tokio::test]
        async fn test_first_protocol_without_selector() {
            let network = MockNetwork::new();
            let _listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let client = MockClient::connect_with_protocols(&network, URL, &["x", "y"]).unwrap();
            settle().await;
            assert_eq!(client.protocol(), Some("x".to_string()));
        }
    }

    mod frame_tests {
        use super::*;

        #[tokio::test]
        async fn test_send_before_open_fails() {
            let network = MockNetwork::new();
            let _listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let client = MockClient::connect(&network, URL).unwrap();
            let err = client.send("too early").unwrap_err();
            assert!(matches!(err, SocketError::NotOpen { .. }));
        }

        #[tokio::test]
        async fn test_client_frames_reach_peer_callbacks() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            listener.on_connection(move |peer| {
                let sink = Arc::clone(&sink);
                peer.on_message(move |frame| lock(&sink).push(frame.to_string()));
            });
            let client = MockClient::connect(&network, URL).unwrap();
            settle().await;

            client.send("one").unwrap();
            client.send_json(&serde_json::json!({"n": 2})).unwrap();
            assert_eq!(*lock(&seen), vec!["one".to_string(), r#"{"n":2}"#.to_string()]);
        }

        #[tokio::test]
        async fn test_broadcast_reaches_every_client() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let mut a = MockClient::connect(&network, URL).unwrap();
            let mut b = MockClient::connect(&network, URL).unwrap();
            settle().await;

            listener.broadcast("hello everyone");
            assert_eq!(a.received_messages(), vec!["hello everyone".to_string()]);
            assert_eq!(b.received_messages(), vec!["hello everyone".to_string()]);
        }

        #[tokio::test]
        async fn test_send_in_connection_callback() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            listener.on_connection(|peer| {
                peer.send("hello there").unwrap();
            });
            let mut client = MockClient::connect(&network, URL).unwrap();
            settle().await;
            assert_eq!(client.received_messages(), vec!["hello there".to_string()]);
        }
    }

    mod close_tests {
        use super::*;

        #[tokio::test]
        async fn test_listener_close_reaches_clients() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let closes = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&closes);
            listener.on_close(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let mut client = MockClient::connect(&network, URL).unwrap();
            settle().await;
            client.drain_events();

            listener.close(CloseOptions::new(1234, "boom").with_clean(false));
            assert_eq!(client.ready_state(), ReadyState::Closed);
            assert_eq!(
                client.try_next_event(),
                Some(ClientEvent::Close(
                    CloseOptions::new(1234, "boom").with_clean(false)
                ))
            );
            assert_eq!(closes.load(Ordering::SeqCst), 1);
            assert!(listener.peers().is_empty());
        }

        #[tokio::test]
        async fn test_client_close_fires_on_close_once() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let closes = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&closes);
            listener.on_close(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let client = MockClient::connect(&network, URL).unwrap();
            settle().await;

            client.close();
            client.close();
            assert_eq!(closes.load(Ordering::SeqCst), 1);
            assert_eq!(client.ready_state(), ReadyState::Closed);
        }

        #[tokio::test]
        async fn test_close_while_connecting_skips_callbacks() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let events = Arc::new(AtomicUsize::new(0));
            let on_connect = Arc::clone(&events);
            listener.on_connection(move |_| {
                on_connect.fetch_add(1, Ordering::SeqCst);
            });
            let on_close = Arc::clone(&events);
            listener.on_close(move |_| {
                on_close.fetch_add(1, Ordering::SeqCst);
            });

            let mut client = MockClient::connect(&network, URL).unwrap();
            client.close();
            settle().await;

            assert_eq!(events.load(Ordering::SeqCst), 0);
            assert!(listener.peers().is_empty());
            assert_eq!(
                client.drain_events(),
                vec![ClientEvent::Close(CloseOptions::default())]
            );
        }

        #[tokio::test]
        async fn test_drop_closes_uncleanly() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            listener.on_close(move |peer| lock(&sink).push(peer.ready_state()));
            let client = MockClient::connect(&network, URL).unwrap();
            settle().await;
            assert_eq!(listener.peers().len(), 1);

            drop(client);
            assert!(listener.peers().is_empty());
            assert_eq!(*lock(&seen), vec![ReadyState::Closed]);
        }

        #[tokio::test]
        async fn test_refuse_from_connection_callback() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            listener.on_connection(|peer| {
                peer.close(CloseOptions::new(1003, "NOPE").with_clean(false));
            });
            let mut client = MockClient::connect(&network, URL).unwrap();
            settle().await;

            assert_eq!(client.ready_state(), ReadyState::Closed);
            let events = client.drain_events();
            assert_eq!(
                events.last(),
                Some(&ClientEvent::Close(
                    CloseOptions::new(1003, "NOPE").with_clean(false)
                ))
            );
        }

        #[tokio::test]
        async fn test_emit_error() {
            let network = MockNetwork::new();
            let listener = network.listen(URL, ListenerOptions::new()).unwrap();
            let mut client = MockClient::connect(&network, URL).unwrap();
            settle().await;
            client.drain_events();

            listener.emit_error();
            assert_eq!(
                client.try_next_event(),
                Some(ClientEvent::Error {
                    origin: "ws://localhost:1234/".to_string()
                })
            );
        }
    }
}
