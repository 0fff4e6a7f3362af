//! Session driver: runs the `ebus_core` state machine over a transport.
//!
//! The driver owns the transport and the per-command deadline for the whole
//! session; neither escapes this module.  For every [`Step`] it performs the
//! I/O, then waits for exactly one of three things:
//!
//! - the next line from the daemon (fed back into the machine),
//! - the deadline armed when the in-flight command was written,
//! - the caller's cancellation token.
//!
//! Whatever the exit path, [`run_session`] closes the transport exactly once
//! before returning; the end-of-transmission byte is only written after a
//! clean finish.

use std::time::Duration;

use ebus_core::{LogSink, SessionConfig, SessionMachine, Step};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BusTransport, SessionError, EOT};

/// Resolves when `token` fires; never resolves without a token.
pub(crate) async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Executes `commands` over `transport`, logging into `sink`.
///
/// Returns the number of commands whose response completed.
///
/// # Errors
///
/// Returns [`SessionError::Fault`] for daemon errors, timeouts, stream end and
/// cancellation, and [`SessionError::Io`] for read/write failures.  Lines
/// logged before the failure stay in `sink`.
pub async fn run_session<T: BusTransport>(
    mut transport: T,
    commands: Vec<String>,
    config: &SessionConfig,
    sink: &mut dyn LogSink,
    cancel: Option<&CancellationToken>,
) -> Result<usize, SessionError> {
    let mut machine = SessionMachine::new(commands, &config.mode);
    let result = drive(
        &mut transport,
        &mut machine,
        config.command_timeout,
        sink,
        cancel,
    )
    .await;

    // Finalizer: runs once on every path.  The pending deadline is dropped
    // together with `drive`'s future.
    match &result {
        Ok(()) => {
            if let Err(e) = transport.write_raw(&[EOT]).await {
                debug!("ignoring failed end-of-transmission write: {e}");
            }
            info!("ebusd session completed ({} commands)", machine.completed());
        }
        Err(e) => warn!("ebusd session aborted: {e}"),
    }
    transport.close().await;
    machine.close();

    result.map(|()| machine.completed())
}

async fn drive<T: BusTransport>(
    transport: &mut T,
    machine: &mut SessionMachine,
    command_timeout: Duration,
    sink: &mut dyn LogSink,
    cancel: Option<&CancellationToken>,
) -> Result<(), SessionError> {
    let mut step = machine.dispatch()?;
    let mut deadline = Instant::now() + command_timeout;

    loop {
        match step {
            Step::Send { command, echo } => {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    return Err(machine.on_cancel().into());
                }
                if let Some(entry) = echo {
                    sink.log(&[&entry]);
                }
                debug!("-> {command}");
                // Fresh window per command; data lines do not extend it.
                deadline = Instant::now() + command_timeout;
                transport.write_line(&command).await?;
            }
            Step::Log(entry) => sink.log(&[&entry]),
            Step::Finish => return Ok(()),
        }

        let line = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(machine.on_cancel().into()),
            read = tokio::time::timeout_at(deadline, transport.read_line()) => match read {
                Err(_elapsed) => return Err(machine.on_timeout().into()),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(None)) => return Err(machine.on_stream_end().into()),
                Ok(Ok(Some(line))) => line,
            },
        };
        debug!("<- {line}");
        step = machine.on_line(&line)?;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
