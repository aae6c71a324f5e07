//! Membership over the messages received so far.

use super::{all_matched, invalid_server, to_array, Received};
use crate::assertion::{FailureReport, MatcherName, MatcherState, Verdict};
use crate::codec::Message;

const MATCHER: MatcherName = MatcherName::ToHaveReceivedMessages;

/// Check that every expected message is somewhere in the server's history.
///
/// Order, duplicates and extra history are ignored, so an empty expectation
/// always passes. Negated, the assertion succeeds when at least one expected
/// message is missing.
pub fn to_have_received_messages<'a>(
    state: &MatcherState,
    received: Received<'a>,
    expected: &'a [Message],
) -> Verdict<'a> {
    let Some(server) = received.server() else {
        return invalid_server(state, MATCHER, received);
    };

    let history = server.messages();
    let pass = all_matched(expected, &history);
    let actual = to_array(&history);
    let wanted = to_array(expected);

    Verdict::new(MATCHER, pass, {
        let actual = actual.clone();
        let wanted = wanted.clone();
        move |state: &MatcherState| {
            let (title, received_title) = if state.is_not {
                (
                    "Expected the MessageServer to not have received the following messages:",
                    "But it received:",
                )
            } else {
                (
                    "Expected the MessageServer to have received the following messages:",
                    "Received:",
                )
            };
            FailureReport::new(state, MATCHER)
                .section(title, &state.print_expected(&wanted))
                .section(received_title, &state.print_received(&actual))
                .finish()
        }
    })
    .with_actual(actual)
    .with_expected(wanted)
}
