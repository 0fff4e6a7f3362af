//! ebus-notebook library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does ebus-notebook do? (for beginners)
//!
//! eBUS message definitions are written in TypeSpec.  The `tsp2ebusd` tool
//! converts them into the CSV format understood by ebusd.  This crate glues
//! the two together and talks to a running ebusd daemon:
//!
//! 1. Converts a TypeSpec cell to CSV by running the external converter
//!    against temporary files (`infrastructure::conversion`).
//! 2. Filters the CSV down to definition lines and formats one command per
//!    line (`ebus_core::protocol`).
//! 3. Sends the commands over TCP strictly one at a time, collecting the
//!    daemon's answers into a transcript (`infrastructure::network`).
//! 4. Optionally uploads the definitions so ebusd uses them immediately
//!    (`application::run_cell`).

/// Application layer: use cases.
pub mod application;

/// Infrastructure layer: TCP transport, process runners, config file, prompt.
pub mod infrastructure;
