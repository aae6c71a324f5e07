//! Equality of the next message.

use super::{invalid_server, Received};
use crate::assertion::{FailureReport, MatcherName, MatcherState, Verdict};
use crate::codec::Message;
use crate::config::MatcherOptions;
use crate::wait::{race_next_message, Race};
use pretty_assertions::StrComparison;

const MATCHER: MatcherName = MatcherName::ToReceiveMessage;

/// Wait for the next message and compare it with `expected`.
///
/// A timeout fails the assertion whether or not it is negated.
pub async fn to_receive_message<'a>(
    state: &MatcherState,
    received: Received<'a>,
    expected: &'a Message,
    options: MatcherOptions,
) -> Verdict<'a> {
    let Some(server) = received.server() else {
        return invalid_server(state, MATCHER, received);
    };

    let message = match race_next_message(server, options.timeout()).await {
        Race::Message(message) => message,
        Race::TimedOut => {
            let waited = options.timeout_ms();
            return Verdict::new(MATCHER, state.is_not, move |state| {
                FailureReport::new(state, MATCHER)
                    .text("Expected the websocket server to receive a message,\n")
                    .text(&format!("but it didn't receive anything in {waited}ms."))
                    .finish()
            });
        }
    };

    let pass = message == *expected;
    let actual = message.to_value();
    let wanted = expected.to_value();

    Verdict::new(MATCHER, pass, move |state: &MatcherState| {
        let report = FailureReport::new(state, MATCHER);
        if pass {
            return report
                .section(
                    "Expected the next received message to not equal:",
                    &state.print_expected(&wanted),
                )
                .section("Received:", &state.print_received(&message.to_value()))
                .finish();
        }
        let diff = StrComparison::new(
            &state.render(&wanted),
            &state.render(&message.to_value()),
        )
        .to_string();
        report
            .section(
                "Expected the next received message to equal:",
                &state.print_expected(&wanted),
            )
            .section("Received:", &state.print_received(&message.to_value()))
            .section("Difference:", &diff)
            .finish()
    })
    .with_actual(actual)
    .with_expected(expected.to_value())
}
