//! Domain entities for the ebusd client.
//!
//! This module contains pure types with no infrastructure dependencies: no
//! sockets, no files, no environment variable reads.
//!
//! - **`endpoint`**   – Where the daemon lives (host + port).
//! - **`mode`**       – How a batch of lines is shaped into commands and how
//!   the daemon's answers are logged.
//! - **`transcript`** – The ordered log of a session.
//! - **`config`**     – Immutable configuration values handed to each
//!   operation explicitly.

pub mod config;
pub mod endpoint;
pub mod mode;
pub mod transcript;
