//! `expect(...)` entry point for the matchers.
//!
//! ```ignore
//! expect(&server).to_receive_message("hello there").await?;
//! expect(&server).not().to_have_received_messages(["goodbye"])?;
//! expect(&server)
//!     .to_have_resolved_messages_with(["a", "b"], MatcherOptions::new().partial())
//!     .await?;
//! ```

use crate::assertion::{report, MatcherState};
use crate::codec::Message;
use crate::config::MatcherOptions;
use crate::matchers::{self, Received};
use crate::result::SocketResult;
use std::any::Any;
use std::fmt::Debug;

/// Start an assertion about `value`.
///
/// Any value is accepted; matchers fail when it is not a
/// [`MessageServer`](crate::MessageServer), an `Arc<MessageServer>` or a
/// `Box<MessageServer>`. The type is matched exactly, so other wrappers
/// (a nested `&&MessageServer`, a newtype) are reported as invalid
/// receivers.
pub fn expect<T: Any + Debug>(value: &T) -> Expect<'_> {
    Expect {
        received: Received::new(value),
        state: MatcherState::new(),
    }
}

/// Assertion builder returned by [`expect`]
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Expect<'a> {
    received: Received<'a>,
    state: MatcherState,
}

impl<'a> Expect<'a> {
    /// Negate the assertion
    pub const fn not(mut self) -> Self {
        self.state = self.state.negated();
        self
    }

    /// Print values in full in failure reports
    pub const fn expand(mut self) -> Self {
        self.state = self.state.expanded();
        self
    }

    /// Style failure reports with terminal colors
    pub const fn colored(mut self, color: bool) -> Self {
        self.state = self.state.with_color(color);
        self
    }

    /// Current matcher state
    pub const fn state(&self) -> MatcherState {
        self.state
    }

    /// Every message in `expected` has been received, in any order
    pub fn to_have_received_messages<I, M>(&self, expected: I) -> SocketResult<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        let expected: Vec<Message> = expected.into_iter().map(Into::into).collect();
        let verdict = matchers::to_have_received_messages(&self.state, self.received, &expected);
        report(&self.state, verdict)
    }

    /// The next message equals `expected`, using the default deadline
    pub async fn to_receive_message(&self, expected: impl Into<Message>) -> SocketResult<()> {
        let options = MatcherOptions::from_env()?;
        self.to_receive_message_with(expected, options).await
    }

    /// The next message equals `expected`
    pub async fn to_receive_message_with(
        &self,
        expected: impl Into<Message>,
        options: MatcherOptions,
    ) -> SocketResult<()> {
        let expected = expected.into();
        let verdict =
            matchers::to_receive_message(&self.state, self.received, &expected, options).await;
        report(&self.state, verdict)
    }

    /// Once the server is quiet, its history equals `expected`, using the
    /// default deadline
    pub async fn to_have_resolved_messages<I, M>(&self, expected: I) -> SocketResult<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        let options = MatcherOptions::from_env()?;
        self.to_have_resolved_messages_with(expected, options).await
    }

    /// Once the server is quiet, its history equals (or with `partial`,
    /// contains) `expected`
    pub async fn to_have_resolved_messages_with<I, M>(
        &self,
        expected: I,
        options: MatcherOptions,
    ) -> SocketResult<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        let expected: Vec<Message> = expected.into_iter().map(Into::into).collect();
        let verdict =
            matchers::to_have_resolved_messages(&self.state, self.received, &expected, options)
                .await;
        report(&self.state, verdict)
    }
}
