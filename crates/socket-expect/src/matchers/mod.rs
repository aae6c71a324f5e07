//! Message matchers.
//!
//! Each matcher takes the value under test as a [`Received`] and returns a
//! [`Verdict`]. A receiver that is not a [`MessageServer`] always fails, negated
//! or not.

mod receive;
mod received;
mod resolved;

pub use receive::to_receive_message;
pub use received::to_have_received_messages;
pub use resolved::to_have_resolved_messages;

use crate::assertion::{FailureReport, MatcherName, MatcherState, Verdict};
use crate::codec::Message;
use crate::server::MessageServer;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The value an assertion was made about
#[derive(Clone, Copy)]
pub struct Received<'a> {
    value: &'a dyn Any,
    debug: &'a dyn fmt::Debug,
    type_name: &'static str,
}

impl fmt::Debug for Received<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Received")
            .field("type_name", &self.type_name)
            .field("value", self.debug)
            .finish()
    }
}

impl<'a> Received<'a> {
    /// Wrap any value
    pub fn new<T: Any + fmt::Debug>(value: &'a T) -> Self {
        Self {
            value,
            debug: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The server, if that is what was received.
    ///
    /// A `MessageServer` is recognized directly or behind an `Arc` or `Box`.
    #[must_use]
    pub fn server(&self) -> Option<&'a MessageServer> {
        let value = self.value;
        value
            .downcast_ref::<MessageServer>()
            .or_else(|| value.downcast_ref::<Arc<MessageServer>>().map(Arc::as_ref))
            .or_else(|| value.downcast_ref::<Box<MessageServer>>().map(Box::as_ref))
    }

    /// Type name of the received value
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Failing verdict for a receiver that is not a server
pub fn invalid_server<'a>(
    state: &MatcherState,
    matcher: MatcherName,
    received: Received<'a>,
) -> Verdict<'a> {
    Verdict::new(matcher, state.is_not, move |state| {
        FailureReport::new(state, matcher)
            .text("Expected the websocket object to be a valid MessageServer mock.\n")
            .text(&format!(
                "Received: {}\n  {}",
                received.type_name,
                state.paint_received(&format!("{:?}", received.debug))
            ))
            .finish()
    })
}

/// Every expected message deep-equals some message in `history`
pub(crate) fn all_matched(expected: &[Message], history: &[Message]) -> bool {
    expected.iter().all(|e| history.iter().any(|m| m == e))
}

pub(crate) fn to_array(messages: &[Message]) -> Value {
    Value::Array(messages.iter().map(Message::to_value).collect())
}
