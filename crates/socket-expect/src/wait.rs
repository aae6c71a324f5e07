//! Deadline-guarded waits on a [`MessageServer`].
//!
//! Every helper suspends only the calling task. The deadline timer is owned by
//! the race and dropped on every exit path, so nothing lingers after a message
//! wins.

use crate::codec::Message;
use crate::result::{SocketError, SocketResult};
use crate::server::MessageServer;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

// =============================================================================
// RACE
// =============================================================================

/// Outcome of racing the next message against a deadline
#[derive(Debug, Clone, PartialEq)]
pub enum Race {
    /// A message arrived first
    Message(Message),
    /// The deadline elapsed first
    TimedOut,
}

impl Race {
    /// Check if the deadline won
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Take the message, if one arrived
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Message(message) => Some(message),
            Self::TimedOut => None,
        }
    }
}

/// Take the next message from `server`, or give up after `timeout`.
///
/// A message already queued wins without waiting. Losing the race consumes
/// nothing.
pub async fn race_next_message(server: &MessageServer, timeout: Duration) -> Race {
    match tokio::time::timeout(timeout, server.next_message()).await {
        Ok(message) => Race::Message(message),
        Err(_) => {
            trace!(url = %server.url(), ?timeout, "no message before deadline");
            Race::TimedOut
        }
    }
}

// =============================================================================
// DRAIN
// =============================================================================

/// Consume messages until `server` stays quiet for a full `timeout`.
///
/// Returns how many messages were consumed. They remain in the server's
/// history.
pub async fn drain_all(server: &MessageServer, timeout: Duration) -> usize {
    let mut drained = 0;
    while let Race::Message(_) = race_next_message(server, timeout).await {
        drained += 1;
    }
    debug!(url = %server.url(), drained, "server drained");
    drained
}

// =============================================================================
// DEADLINES
// =============================================================================

/// Run a fallible wait under a deadline.
///
/// ```ignore
/// let peer = within(Duration::from_millis(500), server.connected()).await?;
/// ```
pub async fn within<T, F>(timeout: Duration, wait: F) -> SocketResult<T>
where
    F: Future<Output = SocketResult<T>>,
{
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| SocketError::Timeout {
            ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerOptions;
    use crate::registry::ServerRegistry;
    use crate::websocket::MockClient;
    use tokio::time::Instant;

    const URL: &str = "ws://localhost:4321";
    const DEADLINE: Duration = Duration::from_millis(1_000);

    async fn connected() -> (ServerRegistry, MessageServer, MockClient) {
        let registry = ServerRegistry::new();
        let server = MessageServer::bind(&registry, URL, ServerOptions::new()).unwrap();
        let client = MockClient::connect(registry.network(), URL).unwrap();
        server.connected().await.unwrap();
        (registry, server, client)
    }

    mod race_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_queued_message_wins_immediately() {
            let (_registry, server, client) = connected().await;
            client.send("ready").unwrap();
            let start = Instant::now();
            let race = race_next_message(&server, DEADLINE).await;
            assert_eq!(race, Race::Message(Message::text("ready")));
            assert_eq!(start.elapsed(), Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_times_out_after_deadline() {
            let (_registry, server, _client) = connected().await;
            let start = Instant::now();
            let race = race_next_message(&server, DEADLINE).await;
            assert!(race.is_timed_out());
            assert!(start.elapsed() >= DEADLINE);
            assert_eq!(race.into_message(), None);
        }

        #[tokio::test(start_paused = true)]
        async fn test_message_sent_mid_wait_wins() {
            let (_registry, server, client) = connected().await;
            let sender = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                client.send("late").unwrap();
                client
            });
            let race = race_next_message(&server, DEADLINE).await;
            assert_eq!(race.into_message(), Some(Message::text("late")));
            sender.await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_consumes_nothing() {
            let (_registry, server, client) = connected().await;
            assert!(race_next_message(&server, DEADLINE).await.is_timed_out());
            client.send("after").unwrap();
            assert_eq!(server.pending_len(), 1);
        }
    }

    mod drain_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_drain_counts_and_keeps_history() {
            let (_registry, server, client) = connected().await;
            for frame in ["a", "b", "c"] {
                client.send(frame).unwrap();
            }
            assert_eq!(drain_all(&server, DEADLINE).await, 3);
            assert_eq!(server.pending_len(), 0);
            assert_eq!(server.messages().len(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_drain_empty_costs_one_deadline() {
            let (_registry, server, _client) = connected().await;
            let start = Instant::now();
            assert_eq!(drain_all(&server, DEADLINE).await, 0);
            let elapsed = start.elapsed();
            assert!(elapsed >= DEADLINE && elapsed < DEADLINE * 2);
        }
    }

    mod within_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_connection_within_deadline() {
            let registry = ServerRegistry::new();
            let server = MessageServer::bind(&registry, URL, ServerOptions::new()).unwrap();
            let client = MockClient::connect(registry.network(), URL).unwrap();
            let peer = within(DEADLINE, server.connected()).await.unwrap();
            assert_eq!(peer.id(), client.id());
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_connection_times_out() {
            let registry = ServerRegistry::new();
            let server = MessageServer::bind(&registry, URL, ServerOptions::new()).unwrap();
            let err = within(DEADLINE, server.connected()).await.unwrap_err();
            assert!(matches!(err, SocketError::Timeout { ms: 1_000 }));
        }
    }
}
