//! Scripted transport and connector for unit and integration tests.
//!
//! # Why a mock transport?
//!
//! The session's guarantees (one command in flight, no writes after an error,
//! exactly one close) are about *what goes over the wire*.  A real socket
//! cannot tell us how many times `close` was called.  [`MockTransport`]
//! records every call in a shared [`TransportLog`] the test keeps a handle to.
//!
//! # Scripting replies
//!
//! The script holds one reply block per command.  A block is released only
//! when its command is written, so replies can never arrive early.  An empty
//! block (or a missing one) means the daemon stays silent: `read_line` then
//! pends forever, which is how timeouts and cancellation are exercised.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ebus_core::Endpoint;

use super::{BusTransport, Connector, SessionError};

#[derive(Debug, Default)]
struct Recorded {
    writes: Vec<String>,
    raw_writes: Vec<Vec<u8>>,
    closes: usize,
    pipelined: usize,
}

/// Shared record of everything a [`MockTransport`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    inner: Arc<Mutex<Recorded>>,
}

impl TransportLog {
    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    /// Lines written with `write_line`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.with(|r| r.writes.clone())
    }

    /// Buffers written with `write_raw`, in order.
    pub fn raw_writes(&self) -> Vec<Vec<u8>> {
        self.with(|r| r.raw_writes.clone())
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.with(|r| r.closes)
    }

    /// Number of commands written while the previous reply was still unread.
    pub fn pipelined(&self) -> usize {
        self.with(|r| r.pipelined)
    }
}

/// A scripted [`BusTransport`].
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Vec<String>>,
    pending: VecDeque<String>,
    log: TransportLog,
    eof_when_idle: bool,
    fail_writes: bool,
}

impl MockTransport {
    /// Creates a transport answering command *k* with `script[k]`.
    pub fn new(script: Vec<Vec<String>>) -> Self {
        Self {
            script: script.into(),
            pending: VecDeque::new(),
            log: TransportLog::default(),
            eof_when_idle: false,
            fail_writes: false,
        }
    }

    /// Reports end of stream instead of pending when no reply is queued.
    pub fn closing_when_idle(mut self) -> Self {
        self.eof_when_idle = true;
        self
    }

    /// Makes every `write_line` fail with `BrokenPipe`.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Handle to the call record; stays valid after the transport is consumed.
    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }
}

#[async_trait]
impl BusTransport for MockTransport {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        let pipelined = !self.pending.is_empty();
        self.log.with(|r| {
            r.writes.push(line.to_string());
            if pipelined {
                r.pipelined += 1;
            }
        });
        if let Some(block) = self.script.pop_front() {
            self.pending.extend(block);
        }
        Ok(())
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.log.with(|r| r.raw_writes.push(bytes.to_vec()));
        Ok(())
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        if self.eof_when_idle {
            return Ok(None);
        }
        std::future::pending().await
    }

    async fn close(&mut self) {
        self.log.with(|r| r.closes += 1);
    }
}

/// A [`Connector`] handing out one prepared [`MockTransport`].
#[derive(Debug)]
pub struct MockConnector {
    transport: Mutex<Option<MockTransport>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    /// Connector that yields `transport` on the first attempt.
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Connector whose every attempt is refused.
    pub fn refusing() -> Self {
        Self {
            transport: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        _timeout: Duration,
    ) -> Result<MockTransport, SessionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let taken = self
            .transport
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        taken.ok_or_else(|| SessionError::Connect {
            endpoint: endpoint.to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"),
        })
    }
}
