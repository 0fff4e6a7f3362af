//! # ebus-core
//!
//! Shared library for the eBUS notebook tooling containing the ebusd line
//! protocol logic, domain entities, and the pure helpers of the TypeSpec
//! conversion step.
//!
//! This crate has zero dependencies on sockets, processes, or async runtimes.
//! Everything here can be unit-tested without a running ebusd daemon.
//!
//! # Architecture overview (for beginners)
//!
//! [ebusd](https://github.com/john30/ebusd) is a daemon that talks to devices on
//! an eBUS (a two-wire bus used by heating systems).  It exposes a plain-text
//! TCP interface: the client writes one command per line and the daemon answers
//! with zero or more lines followed by one blank line.
//!
//! This crate (`ebus-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Endpoint, command-shaping mode, transcript sink, and the
//!   immutable configuration values passed into every operation.
//!
//! - **`protocol`** – How conversion output becomes a command stream: the line
//!   filter, the command formatter, reply classification, and the
//!   request/response state machine that enforces one command in flight.
//!
//! - **`conversion`** – Preparing TypeSpec input for the external `tsp2ebusd`
//!   converter and post-processing its CSV output.

pub mod conversion;
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ebus_core::Mode` instead of `ebus_core::domain::mode::Mode`.
pub use domain::config::{ConversionConfig, SelectionPolicy, SessionConfig, ShowOption};
pub use domain::endpoint::{Endpoint, EndpointError};
pub use domain::mode::Mode;
pub use domain::transcript::{LogSink, Transcript};
pub use protocol::filter::filter_lines;
pub use protocol::format::{format_command, CommandTemplate};
pub use protocol::reply::ReplyLine;
pub use protocol::session::{SessionFault, SessionMachine, SessionState, Step};
