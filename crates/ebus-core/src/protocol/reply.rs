//! Classification of lines received from ebusd.

/// Prefix of a daemon-reported failure.
pub const ERROR_PREFIX: &str = "ERR:";

/// One newline-delimited line received from the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine<'a> {
    /// Blank line: the response to the current command is complete.
    Terminator,
    /// `ERR:` line: the daemon rejected the command.
    Error(&'a str),
    /// Anything else: payload of the current response.
    Data(&'a str),
}

impl<'a> ReplyLine<'a> {
    /// Classifies a received line (without its trailing newline).
    ///
    /// A trailing `\r` is ignored so that a CRLF-terminated blank line still
    /// counts as the terminator.
    pub fn classify(line: &'a str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            ReplyLine::Terminator
        } else if line.starts_with(ERROR_PREFIX) {
            ReplyLine::Error(line)
        } else {
            ReplyLine::Data(line)
        }
    }
}
