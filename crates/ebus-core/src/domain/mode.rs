//! Command-shaping mode.
//!
//! The mode decides two things at once:
//!
//! 1. Which template turns a filtered line into the command text that goes on
//!    the wire (see [`crate::protocol::format`]).
//! 2. How the session logs traffic into the transcript: whether outgoing
//!    commands are echoed, and whether daemon replies get a `# ` prefix.
//!
//! | Mode           | Filtering | Echo command | Reply prefix |
//! |----------------|-----------|--------------|--------------|
//! | `Query`        | yes       | yes          | `# `         |
//! | `CustomFormat` | yes       | yes          | `# `         |
//! | `Upload`       | yes       | no           | none         |
//! | `Raw`          | no        | yes          | none         |

/// Prefix that marks daemon replies as comments in Query/CustomFormat output.
pub const REPLY_COMMENT_PREFIX: &str = "# ";

/// How lines are turned into commands and how replies are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    /// Verbose, definition-relative read of each line (the default).
    #[default]
    Query,
    /// Persist each line as a message definition (`define -r`).
    Upload,
    /// Send each line verbatim without filtering.
    Raw,
    /// Externally supplied template containing `${line}` and optionally `${input}`.
    CustomFormat(String),
}

impl Mode {
    /// Whether the input lines go through the line filter first.
    pub fn filters_input(&self) -> bool {
        !matches!(self, Mode::Raw)
    }

    /// Whether outgoing commands are written into the transcript.
    ///
    /// Upload suppresses the echo: the caller only cares about the
    /// acknowledgement lines.
    pub fn echoes_commands(&self) -> bool {
        !matches!(self, Mode::Upload)
    }

    /// The prefix put in front of every daemon data line in the transcript.
    pub fn reply_prefix(&self) -> &'static str {
        match self {
            Mode::Query | Mode::CustomFormat(_) => REPLY_COMMENT_PREFIX,
            Mode::Upload | Mode::Raw => "",
        }
    }
}
