//! Network infrastructure: the TCP connection to ebusd.
//!
//! Architecture:
//! - [`BusTransport`] is one open connection that reads and writes whole lines.
//!   [`LineTransport`] implements it over any tokio byte stream;
//!   [`TcpTransport`] is the production alias over a `TcpStream`.
//! - [`Connector`] opens transports.  The use case only sees this trait, so
//!   tests can count connection attempts with [`mock::MockConnector`].
//! - [`session::run_session`] drives the `ebus_core` state machine over a
//!   transport, enforcing the per-command timeout and cancellation.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use ebus_core::{Endpoint, SessionFault};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

pub mod mock;
pub mod session;

pub use session::run_session;

/// End-of-transmission byte written before a clean close.
pub const EOT: u8 = 0x04;

/// Errors that can end an ebusd session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// TCP connection to the daemon failed.
    #[error("failed to connect to ebusd at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The daemon did not accept the connection in time.
    #[error("connection to ebusd at {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    /// The protocol state machine ended the session.
    #[error(transparent)]
    Fault(#[from] SessionFault),
}

/// One open line-oriented connection to ebusd.
///
/// Implementations must make [`BusTransport::read_line`] cancel-safe: the
/// session races it against the timer and the cancellation token.
#[async_trait]
pub trait BusTransport: Send {
    /// Writes `line` followed by `\n`.
    async fn write_line(&mut self, line: &str) -> io::Result<()>;
    /// Writes raw bytes without framing.
    async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Reads the next line without its terminator; `None` at end of stream.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
    /// Closes the connection.  Errors are swallowed: the session is over.
    async fn close(&mut self);
}

/// Opens transports to an [`Endpoint`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// The transport type produced by this connector.
    type Transport: BusTransport;

    /// Opens a connection, giving up after `timeout`.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Self::Transport, SessionError>;
}

/// Line framing over a split byte stream.
///
/// Bytes that are not valid UTF-8 are replaced with `U+FFFD` instead of
/// failing the read.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps the read and write halves of a stream.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            writer,
        }
    }
}

#[async_trait]
impl<R, W> BusTransport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.writer.write_all(framed.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        // Partial reads stay in `pending`, so a cancelled call loses nothing.
        let read = self.reader.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("ignoring error while closing ebusd connection: {e}");
        }
    }
}

/// The production transport: a TCP stream split into owned halves.
pub type TcpTransport = LineTransport<OwnedReadHalf, OwnedWriteHalf>;

/// Opens [`TcpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<TcpTransport, SessionError> {
        let connect = TcpStream::connect((endpoint.host(), endpoint.port()));
        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| SessionError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                after: timeout,
            })?
            .map_err(|source| SessionError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        // Commands are tiny and strictly sequential; do not wait for Nagle.
        stream.set_nodelay(true)?;
        info!("connected to ebusd at {endpoint}");

        let (read_half, write_half) = stream.into_split();
        Ok(LineTransport::new(read_half, write_half))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
