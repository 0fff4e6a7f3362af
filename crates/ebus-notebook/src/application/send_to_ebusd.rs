//! SendToEbusdUseCase: turns conversion lines into a finished ebusd session.
//!
//! `filter_and_send` runs the preconditions in a fixed order before any
//! network activity:
//!
//! 1. build the batch (filter, or keep raw lines verbatim),
//! 2. fail with [`SendError::NoUsableInput`] if the batch is empty,
//! 3. pass the input gate (may end as [`SendOutcome::NotExecuted`]),
//! 4. format one command per line,
//! 5. connect and run the session.
//!
//! # Architecture
//!
//! The use case depends on the [`Connector`] trait and the
//! [`InputProvider`] trait; the TCP connector and the console prompt are
//! injected by `main.rs`, scripted doubles by the tests.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ebus_core::{
    filter_lines, CommandTemplate, Endpoint, LogSink, Mode, SessionConfig, SessionFault,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::input_gate::{resolve_input, GateDecision, InputProvider};
use crate::infrastructure::network::session::cancelled;
use crate::infrastructure::network::{run_session, Connector, SessionError};

/// Why a send failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// Nothing left to send after filtering.
    #[error("no usable input")]
    NoUsableInput,

    #[error("failed to connect to ebusd at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to ebusd at {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },

    /// The daemon answered with an `ERR:` line.
    #[error("error from ebusd: {line}")]
    Daemon { line: String },

    #[error("no response received in time for \"{command}\" (waited {after:?})")]
    Timeout { command: String, after: Duration },

    #[error("connection I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("connection closed by ebusd while waiting for a response")]
    ConnectionClosed,

    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// The daemon broke the request/response cadence.
    #[error("protocol violation: {0}")]
    Protocol(SessionFault),
}

impl SendError {
    fn from_session(err: SessionError, command_timeout: Duration) -> Self {
        match err {
            SessionError::Connect { endpoint, source } => SendError::Connect { endpoint, source },
            SessionError::ConnectTimeout { endpoint, after } => {
                SendError::ConnectTimeout { endpoint, after }
            }
            SessionError::Io(e) => SendError::Io(e),
            SessionError::Fault(fault) => match fault {
                SessionFault::Daemon { line } => SendError::Daemon { line },
                SessionFault::TimedOut { command } => SendError::Timeout {
                    command,
                    after: command_timeout,
                },
                SessionFault::StreamEnded => SendError::ConnectionClosed,
                SessionFault::Cancelled => SendError::Cancelled,
                other => SendError::Protocol(other),
            },
        }
    }

    /// `true` for an intentional abort rather than a malfunction.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SendError::Cancelled)
    }
}

/// How a send ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every command received its terminator.
    Completed { commands: usize },
    /// The input prompt was dismissed; nothing was sent.
    NotExecuted,
}

/// Builds the line batch for `mode`.
///
/// Raw mode keeps the lines verbatim, skipping only blank ones.  Every other
/// mode runs the line filter.
pub fn build_batch<I, S>(lines: I, mode: &Mode) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if mode.filters_input() {
        return filter_lines(lines);
    }
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref();
            let line = line.strip_suffix('\r').unwrap_or(line);
            (!line.trim().is_empty()).then(|| line.to_string())
        })
        .collect()
}

/// Sends line batches to ebusd.
pub struct SendToEbusdUseCase<C: Connector> {
    connector: C,
    input_provider: Option<Arc<dyn InputProvider>>,
}

impl<C: Connector> SendToEbusdUseCase<C> {
    /// Creates the use case without an input provider; interactive sends
    /// are then reported as not executed.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            input_provider: None,
        }
    }

    /// Adds the provider asked for `${input}` values.
    pub fn with_input_provider(mut self, provider: Arc<dyn InputProvider>) -> Self {
        self.input_provider = Some(provider);
        self
    }

    /// The injected connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Filters `lines` per `config.mode` and sends them to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`SendError`].  Transcript entries logged before a failure remain
    /// in `sink`.
    pub async fn filter_and_send<I, S>(
        &self,
        lines: I,
        endpoint: &Endpoint,
        config: &SessionConfig,
        sink: &mut dyn LogSink,
        cancel: Option<&CancellationToken>,
    ) -> Result<SendOutcome, SendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = build_batch(lines, &config.mode);
        self.send_batch(batch, endpoint, config, sink, cancel).await
    }

    /// Sends an already built batch: gate, format, connect, run.
    pub async fn send_batch(
        &self,
        batch: Vec<String>,
        endpoint: &Endpoint,
        config: &SessionConfig,
        sink: &mut dyn LogSink,
        cancel: Option<&CancellationToken>,
    ) -> Result<SendOutcome, SendError> {
        if batch.is_empty() {
            return Err(SendError::NoUsableInput);
        }

        let template = CommandTemplate::for_mode(&config.mode);
        let input =
            match resolve_input(&template, config, self.input_provider.as_deref(), cancel).await {
                GateDecision::Proceed(input) => input,
                GateDecision::Dismissed => {
                    info!("no input given, send not executed");
                    return Ok(SendOutcome::NotExecuted);
                }
                GateDecision::Cancelled => return Err(SendError::Cancelled),
            };

        let commands: Vec<String> = batch
            .iter()
            .map(|line| template.render(line, &input))
            .collect();
        debug!("sending {} commands to {endpoint}", commands.len());

        let transport = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(SendError::Cancelled),
            conn = self.connector.connect(endpoint, config.connect_timeout) => conn
                .map_err(|e| SendError::from_session(e, config.command_timeout))?,
        };

        let completed = run_session(transport, commands, config, sink, cancel)
            .await
            .map_err(|e| SendError::from_session(e, config.command_timeout))?;
        Ok(SendOutcome::Completed {
            commands: completed,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
