//! Full-sequence check after draining outstanding messages.

use super::{all_matched, invalid_server, to_array, Received};
use crate::assertion::{FailureReport, MatcherName, MatcherState, Verdict};
use crate::codec::Message;
use crate::config::MatcherOptions;
use crate::wait::drain_all;

const MATCHER: MatcherName = MatcherName::ToHaveResolvedMessages;

/// Wait for the server to go quiet, then compare its whole history.
///
/// Plain: history must equal `expected` exactly, in order and without extras.
/// With `partial`, or when negated, only membership is checked; a negated
/// assertion therefore succeeds when at least one expected message is missing.
pub async fn to_have_resolved_messages<'a>(
    state: &MatcherState,
    received: Received<'a>,
    expected: &'a [Message],
    options: MatcherOptions,
) -> Verdict<'a> {
    let Some(server) = received.server() else {
        return invalid_server(state, MATCHER, received);
    };

    drain_all(server, options.timeout()).await;
    let history = server.messages();

    let pass = if options.partial || state.is_not {
        all_matched(expected, &history)
    } else {
        history.as_slice() == expected
    };

    let actual = to_array(&history);
    let wanted = to_array(expected);

    Verdict::new(MATCHER, pass, {
        let actual = actual.clone();
        let wanted = wanted.clone();
        move |state: &MatcherState| {
            let title = if state.is_not {
                "Expected the MessageServer to not have received the following messages:"
            } else {
                "Expected the MessageServer to have received all of the following messages:"
            };
            FailureReport::new(state, MATCHER)
                .section(title, &state.print_expected(&wanted))
                .section("But it received:", &state.print_received(&actual))
                .finish()
        }
    })
    .with_actual(actual)
    .with_expected(wanted)
}
