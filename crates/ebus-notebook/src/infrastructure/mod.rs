//! Infrastructure layer for ebus-notebook.
//!
//! Contains everything that touches the outside world.
//!
//! **Dependency rule**: this layer may depend on `application` and `ebus_core`,
//! but `ebus_core` never depends on it.
//!
//! # Sub-modules
//!
//! - **`network`** – TCP line transport to ebusd and the session driver that
//!   runs the `ebus_core` state machine with timeouts and cancellation.
//!
//! - **`conversion`** – Runs the external TypeSpec converter through one of the
//!   interchangeable process runners and recovers its output file.
//!
//! - **`storage`** – TOML configuration file.
//!
//! - **`prompt`** – Console implementation of the interactive input provider.

pub mod conversion;
pub mod network;
pub mod prompt;
pub mod storage;
