//! Request/response state machine for one ebusd session.
//!
//! The machine owns the batch of formatted commands and decides, for every
//! event, what the driver must do next.  It performs no I/O: the driver in
//! `ebus-notebook` reads and writes the socket, runs the timer, and feeds the
//! results back in.  This keeps the single invariant (exactly one command in
//! flight) in one place that can be tested with plain function calls.
//!
//! ```text
//!            dispatch (batch non-empty)
//!   Idle ───────────────────────────────► AwaitingResponse ──┐ data line
//!    ▲                                        │    ▲          │ (Step::Log)
//!    │          blank line                    │    └──────────┘
//!    └────────────────────────────────────────┘
//!   Idle ── dispatch (batch empty) ──► Draining ── close ──► Closed
//!
//!   error line / timeout / cancellation / stream end ───────► Closed
//! ```

use std::collections::VecDeque;

use thiserror::Error;

use crate::domain::mode::Mode;
use crate::protocol::reply::ReplyLine;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no command on the wire.
    Idle,
    /// One command sent, waiting for its blank-line terminator.
    AwaitingResponse,
    /// Batch exhausted; the driver sends end-of-transmission and closes.
    Draining,
    /// Terminal state.
    Closed,
}

/// What the driver has to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write `command` followed by a newline and arm a fresh timeout.
    /// `echo` is the transcript entry to log first, if the mode echoes.
    Send {
        command: String,
        echo: Option<String>,
    },
    /// Append this entry to the transcript and keep reading.
    Log(String),
    /// All commands completed: write EOT (best effort) and close.
    Finish,
}

/// Reasons a session ends without completing its batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionFault {
    /// The daemon answered with an `ERR:` line.
    #[error("error from ebusd: {line}")]
    Daemon { line: String },

    /// No terminator arrived within the per-command window.
    #[error("no response received in time for \"{command}\"")]
    TimedOut { command: String },

    /// The daemon closed the stream while a response was pending.
    #[error("connection closed by ebusd while waiting for a response")]
    StreamEnded,

    /// The caller cancelled the session.
    #[error("cancelled")]
    Cancelled,

    /// A driver call that the current state does not allow.
    #[error("operation not valid in session state {0:?}")]
    InvalidState(SessionState),

    /// A line arrived while no command was in flight.
    #[error("unsolicited line from ebusd: {line}")]
    Unsolicited { line: String },
}

/// The session state machine.
#[derive(Debug)]
pub struct SessionMachine {
    pending: VecDeque<String>,
    in_flight: Option<String>,
    state: SessionState,
    echo: bool,
    reply_prefix: &'static str,
    completed: usize,
}

impl SessionMachine {
    /// Creates a machine for `commands` (already formatted), logging per `mode`.
    pub fn new(commands: Vec<String>, mode: &Mode) -> Self {
        Self {
            pending: commands.into(),
            in_flight: None,
            state: SessionState::Idle,
            echo: mode.echoes_commands(),
            reply_prefix: mode.reply_prefix(),
            completed: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The command currently awaiting its response.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Number of commands not yet sent.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Number of commands whose response completed.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Dequeues the next command, or finishes when the batch is empty.
    ///
    /// Only valid in [`SessionState::Idle`]; in any other state the machine is
    /// left untouched and [`SessionFault::InvalidState`] is returned.
    pub fn dispatch(&mut self) -> Result<Step, SessionFault> {
        if self.state != SessionState::Idle {
            return Err(SessionFault::InvalidState(self.state));
        }
        match self.pending.pop_front() {
            Some(command) => {
                self.state = SessionState::AwaitingResponse;
                let echo = self.echo.then(|| command.clone());
                self.in_flight = Some(command.clone());
                Ok(Step::Send { command, echo })
            }
            None => {
                self.state = SessionState::Draining;
                Ok(Step::Finish)
            }
        }
    }

    /// Feeds one received line into the machine.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFault::Daemon`] for an `ERR:` line and
    /// [`SessionFault::Unsolicited`] when no command is in flight.  Both move
    /// the machine to [`SessionState::Closed`].
    pub fn on_line(&mut self, line: &str) -> Result<Step, SessionFault> {
        if self.state != SessionState::AwaitingResponse {
            self.state = SessionState::Closed;
            return Err(SessionFault::Unsolicited {
                line: line.to_string(),
            });
        }
        match ReplyLine::classify(line) {
            ReplyLine::Terminator => {
                self.in_flight = None;
                self.completed += 1;
                self.state = SessionState::Idle;
                self.dispatch()
            }
            ReplyLine::Error(text) => {
                self.state = SessionState::Closed;
                Err(SessionFault::Daemon {
                    line: text.to_string(),
                })
            }
            ReplyLine::Data(text) => Ok(Step::Log(format!("{}{}", self.reply_prefix, text))),
        }
    }

    /// The per-command timer fired.
    pub fn on_timeout(&mut self) -> SessionFault {
        self.state = SessionState::Closed;
        SessionFault::TimedOut {
            command: self.in_flight.take().unwrap_or_default(),
        }
    }

    /// The caller's cancellation token fired.
    pub fn on_cancel(&mut self) -> SessionFault {
        self.state = SessionState::Closed;
        self.in_flight = None;
        SessionFault::Cancelled
    }

    /// The daemon closed the stream.
    pub fn on_stream_end(&mut self) -> SessionFault {
        self.state = SessionState::Closed;
        self.in_flight = None;
        SessionFault::StreamEnded
    }

    /// Marks the session closed after the driver released the connection.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(cmds: &[&str], mode: Mode) -> SessionMachine {
        SessionMachine::new(cmds.iter().map(|c| c.to_string()).collect(), &mode)
    }

    #[test]
    fn test_first_dispatch_sends_first_command() {
        let mut m = machine(&["a", "b"], Mode::Query);
        let step = m.dispatch().unwrap();
        assert_eq!(
            step,
            Step::Send {
                command: "a".into(),
                echo: Some("a".into())
            }
        );
        assert_eq!(m.state(), SessionState::AwaitingResponse);
        assert_eq!(m.in_flight(), Some("a"));
        assert_eq!(m.remaining(), 1);
    }

    #[test]
    fn test_upload_mode_does_not_echo() {
        let mut m = machine(&["define -r \"x\""], Mode::Upload);
        assert!(matches!(m.dispatch().unwrap(), Step::Send { echo: None, .. }));
    }

    #[test]
    fn test_data_lines_do_not_advance() {
        let mut m = machine(&["a", "b"], Mode::Query);
        m.dispatch().unwrap();
        assert_eq!(m.on_line("21.5").unwrap(), Step::Log("# 21.5".into()));
        assert_eq!(m.on_line("more").unwrap(), Step::Log("# more".into()));
        assert_eq!(m.in_flight(), Some("a"));
        assert_eq!(m.remaining(), 1);
    }

    #[test]
    fn test_raw_and_upload_replies_unprefixed() {
        let mut m = machine(&["info"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(m.on_line("version: 23.1").unwrap(), Step::Log("version: 23.1".into()));

        let mut m = machine(&["define"], Mode::Upload);
        m.dispatch().unwrap();
        assert_eq!(m.on_line("done").unwrap(), Step::Log("done".into()));
    }

    #[test]
    fn test_terminator_sends_next_command() {
        let mut m = machine(&["a", "b"], Mode::Raw);
        m.dispatch().unwrap();
        let step = m.on_line("").unwrap();
        assert!(matches!(step, Step::Send { ref command, .. } if command == "b"));
        assert_eq!(m.completed(), 1);
    }

    #[test]
    fn test_terminator_after_last_command_finishes() {
        let mut m = machine(&["a"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(m.on_line("").unwrap(), Step::Finish);
        assert_eq!(m.state(), SessionState::Draining);
        m.close();
        assert_eq!(m.state(), SessionState::Closed);
    }

    #[test]
    fn test_empty_batch_finishes_immediately() {
        let mut m = machine(&[], Mode::Query);
        assert_eq!(m.dispatch().unwrap(), Step::Finish);
    }

    #[test]
    fn test_error_line_closes_session() {
        let mut m = machine(&["a", "b"], Mode::Query);
        m.dispatch().unwrap();
        let err = m.on_line("ERR: device not found").unwrap_err();
        assert_eq!(
            err,
            SessionFault::Daemon {
                line: "ERR: device not found".into()
            }
        );
        assert!(err.to_string().contains("device not found"));
        assert_eq!(m.state(), SessionState::Closed);
        assert_eq!(m.remaining(), 1, "no further command is dequeued");
    }

    #[test]
    fn test_timeout_reports_in_flight_command() {
        let mut m = machine(&["slow"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(
            m.on_timeout(),
            SessionFault::TimedOut {
                command: "slow".into()
            }
        );
        assert_eq!(m.state(), SessionState::Closed);
    }

    #[test]
    fn test_line_while_idle_is_unsolicited() {
        let mut m = machine(&["a"], Mode::Raw);
        assert!(matches!(
            m.on_line("hello"),
            Err(SessionFault::Unsolicited { .. })
        ));
    }

    #[test]
    fn test_dispatch_while_awaiting_is_rejected() {
        let mut m = machine(&["a", "b"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(
            m.dispatch(),
            Err(SessionFault::InvalidState(SessionState::AwaitingResponse))
        );
        assert_eq!(m.in_flight(), Some("a"));
    }

    #[test]
    fn test_cancel_and_stream_end_close() {
        let mut m = machine(&["a"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(m.on_cancel(), SessionFault::Cancelled);
        assert_eq!(m.state(), SessionState::Closed);

        let mut m = machine(&["a"], Mode::Raw);
        m.dispatch().unwrap();
        assert_eq!(m.on_stream_end(), SessionFault::StreamEnded);
    }
}
