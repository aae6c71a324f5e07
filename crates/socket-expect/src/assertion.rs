//! Verdicts and failure reports.
//!
//! A matcher produces a [`Verdict`]; [`report`] turns it into `Ok(())` or an
//! [`SocketError::AssertionFailed`] carrying the rendered explanation. The
//! explanation is only rendered when the assertion fails.

use crate::result::{SocketError, SocketResult};
use console::style;
use serde_json::Value;
use std::fmt;
use tracing::debug;

// =============================================================================
// MATCHER STATE
// =============================================================================

/// Context supplied to every matcher invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherState {
    /// The assertion was negated with `.not()`
    pub is_not: bool,
    /// Print values in full multi-line form
    pub expand: bool,
    /// Style the report with terminal colors
    pub color: bool,
}

impl MatcherState {
    /// Create state for a plain assertion
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Negate the assertion
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.is_not = !self.is_not;
        self
    }

    /// Print values in full
    #[must_use]
    pub const fn expanded(mut self) -> Self {
        self.expand = true;
        self
    }

    /// Enable or disable terminal colors
    #[must_use]
    pub const fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Render an expected value
    #[must_use]
    pub fn print_expected(&self, value: &Value) -> String {
        style(self.render(value)).green().force_styling(self.color).to_string()
    }

    /// Render a received value
    #[must_use]
    pub fn print_received(&self, value: &Value) -> String {
        self.paint_received(&self.render(value))
    }

    /// Style already-rendered received text
    #[must_use]
    pub fn paint_received(&self, text: &str) -> String {
        style(text).red().force_styling(self.color).to_string()
    }

    /// Render a value as JSON, pretty-printed when expanded
    #[must_use]
    pub fn render(&self, value: &Value) -> String {
        let rendered = if self.expand {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| value.to_string())
    }

    /// `expect(MessageServer)[.not()].<matcher>(expected)`
    #[must_use]
    pub fn hint(&self, matcher: MatcherName) -> String {
        let dim = |s: &str| style(s).dim().force_styling(self.color).to_string();
        let negation = if self.is_not { ".not()" } else { "" };
        format!(
            "{}{}{}{}{}{}{}",
            dim("expect("),
            style("MessageServer").red().force_styling(self.color),
            dim(")"),
            negation,
            format_args!(".{}", matcher.name()),
            dim("("),
            format_args!("{}{}", style("expected").green().force_styling(self.color), dim(")")),
        )
    }
}

// =============================================================================
// VERDICT
// =============================================================================

/// The matchers this crate provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherName {
    /// Membership over current history
    ToHaveReceivedMessages,
    /// Equality of the next message
    ToReceiveMessage,
    /// Full sequence after draining
    ToHaveResolvedMessages,
}

impl MatcherName {
    /// Method name as written at the call site
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToHaveReceivedMessages => "to_have_received_messages",
            Self::ToReceiveMessage => "to_receive_message",
            Self::ToHaveResolvedMessages => "to_have_resolved_messages",
        }
    }
}

impl fmt::Display for MatcherName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

type Explain<'a> = Box<dyn FnOnce(&MatcherState) -> String + 'a>;

/// Raw outcome of a matcher.
///
/// `pass` is the un-negated result: the assertion succeeds exactly when
/// `pass != state.is_not`.
pub struct Verdict<'a> {
    /// Matcher that produced this verdict
    pub matcher: MatcherName,
    /// Un-negated result
    pub pass: bool,
    /// Value observed, if any
    pub actual: Option<Value>,
    /// Value asserted, if any
    pub expected: Option<Value>,
    explain: Explain<'a>,
}

impl fmt::Debug for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verdict")
            .field("matcher", &self.matcher)
            .field("pass", &self.pass)
            .field("actual", &self.actual)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

impl<'a> Verdict<'a> {
    /// Create a verdict with a deferred explanation
    pub fn new<F>(matcher: MatcherName, pass: bool, explain: F) -> Self
    where
        F: FnOnce(&MatcherState) -> String + 'a,
    {
        Self {
            matcher,
            pass,
            actual: None,
            expected: None,
            explain: Box::new(explain),
        }
    }

    /// Attach the observed value
    #[must_use]
    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }

    /// Attach the asserted value
    #[must_use]
    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Whether the assertion succeeds under `state`
    #[must_use]
    pub const fn succeeds(&self, state: &MatcherState) -> bool {
        self.pass != state.is_not
    }

    /// Render the explanation
    #[must_use]
    pub fn explain(self, state: &MatcherState) -> String {
        (self.explain)(state)
    }
}

/// Turn a verdict into the assertion outcome
pub fn report(state: &MatcherState, verdict: Verdict<'_>) -> SocketResult<()> {
    if verdict.succeeds(state) {
        return Ok(());
    }
    let matcher = verdict.matcher;
    let message = verdict.explain(state);
    debug!(%matcher, negated = state.is_not, "assertion failed");
    Err(SocketError::AssertionFailed { message })
}

// =============================================================================
// FAILURE REPORT
// =============================================================================

/// Multi-line failure message: a hint line followed by titled, indented blocks
#[derive(Debug, Clone)]
pub struct FailureReport {
    hint: String,
    body: String,
}

impl FailureReport {
    /// Start a report for `matcher`
    #[must_use]
    pub fn new(state: &MatcherState, matcher: MatcherName) -> Self {
        Self {
            hint: state.hint(matcher),
            body: String::new(),
        }
    }

    /// Append free text verbatim
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.body.push_str(text);
        self
    }

    /// Append a title followed by `content` indented two spaces.
    ///
    /// Blank lines in `content` are dropped.
    #[must_use]
    pub fn section(mut self, title: &str, content: &str) -> Self {
        let indented: Vec<String> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("  {line}"))
            .collect();
        self.body.push_str(title.trim());
        self.body.push_str("\n\n");
        self.body.push_str(&indented.join("\n"));
        self.body.push_str("\n\n");
        self
    }

    /// Finish the report
    #[must_use]
    pub fn finish(self) -> String {
        format!("{}\n\n{}\n", self.hint, self.body.trim_end())
    }
}
