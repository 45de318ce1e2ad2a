//! Roster rendering
//!
//! Turns a [`RosterSnapshot`] into the text shown in every display message.
//! Rendering is a pure function of the snapshot: the same snapshot always
//! yields byte-identical output, which is what lets an unchanged roster be
//! re-applied to every target without visible churn.

use super::RosterSnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Public server browser linked from each entry
pub const SERVERS_PAGE_URL: &str = "https://midair2.gg/servers";

/// Shown when no server passes the listing filter
pub const NO_SERVERS_PLACEHOLDER: &str = "*No servers to display...* ☹️";

/// Footer text shared by every display message
pub const FOOTER_TEXT: &str = "Only unlocked servers are shown.\nLast updated";

/// Rendered roster shared by all targets during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRoster {
    lines: Vec<String>,
    footer: String,
    timestamp: DateTime<Utc>,
}

impl RenderedRoster {
    /// One line per listed server, or the placeholder
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn body(&self) -> String {
        self.lines.join("\n")
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the roster rendered as the placeholder
    pub fn is_placeholder(&self) -> bool {
        self.lines.len() == 1 && self.lines[0] == NO_SERVERS_PLACEHOLDER
    }
}

impl fmt::Display for RenderedRoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.body())?;
        writeln!(f, "--")?;
        write!(
            f,
            "{} {}",
            self.footer,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Render a snapshot
pub fn render_roster(snapshot: &RosterSnapshot) -> RenderedRoster {
    let mut lines: Vec<String> = snapshot
        .listable()
        .map(|server| {
            format!(
                "[{}/{}] [{}]({}) - *{}*",
                server.players, server.max_players, server.name, SERVERS_PAGE_URL, server.map
            )
        })
        .collect();

    if lines.is_empty() {
        lines.push(NO_SERVERS_PLACEHOLDER.to_string());
    }

    RenderedRoster {
        lines,
        footer: FOOTER_TEXT.to_string(),
        timestamp: snapshot.fetched_at(),
    }
}

/// What a publisher writes for one target: the shared roster under the
/// target's own title
#[derive(Debug, Clone, Copy)]
pub struct MessageContent<'a> {
    pub title: &'a str,
    pub roster: &'a RenderedRoster,
}

impl<'a> MessageContent<'a> {
    pub fn new(title: &'a str, roster: &'a RenderedRoster) -> Self {
        Self { title, roster }
    }
}
