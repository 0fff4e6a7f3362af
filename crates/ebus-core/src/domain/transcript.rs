//! Session transcript and the logging sink abstraction.
//!
//! The session does not print anything itself.  It hands ordered textual
//! fragments to a [`LogSink`] supplied by the caller.  [`Transcript`] is the
//! standard sink: it joins the fragments of each call into one entry.

use serde::Serialize;

/// Receives ordered textual fragments produced by a session.
///
/// Each call is one log entry; `parts` are the tokens of that entry.
pub trait LogSink: Send {
    /// Appends one entry made of `parts`.
    fn log(&mut self, parts: &[&str]);
}

/// Append-only, ordered list of log entries.
///
/// Owned by the caller once the session returns, including when the session
/// failed part-way: whatever was accumulated stays available for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<String>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in chronological order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the transcript as newline-separated text.
    pub fn to_text(&self) -> String {
        self.entries.join("\n")
    }
}

impl LogSink for Transcript {
    fn log(&mut self, parts: &[&str]) {
        self.entries.push(parts.join(" "));
    }
}

impl LogSink for Vec<String> {
    fn log(&mut self, parts: &[&str]) {
        self.push(parts.join(" "));
    }
}
