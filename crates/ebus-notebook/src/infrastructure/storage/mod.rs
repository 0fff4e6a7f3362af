//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory (or an explicit path), writes it back, and
//! falls back to defaults when no file exists yet.  It also converts the file
//! sections into the immutable `ebus_core` configuration values handed to
//! each operation.

pub mod config;
