//! ebusd line protocol: preparing the command stream and driving the
//! request/response cadence.
//!
//! ```text
//! conversion output ──► filter ──► format ──► session machine ◄── reply
//!                                                  │
//!                                                  ▼
//!                                              transcript
//! ```

pub mod filter;
pub mod format;
pub mod reply;
pub mod select;
pub mod session;

pub use filter::filter_lines;
pub use format::{format_command, CommandTemplate};
pub use reply::ReplyLine;
pub use session::{SessionFault, SessionMachine, SessionState, Step};
