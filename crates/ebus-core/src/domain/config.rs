//! Immutable configuration values passed into each operation.
//!
//! Nothing in the core reads configuration from global state.  The
//! infrastructure layer (TOML file + CLI flags) builds these structs once and
//! hands them to `filter_and_send` / `run_conversion` explicitly, which keeps
//! every operation testable without a host environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::mode::Mode;

/// Per-command response window used by ebusd sessions.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(3000);

/// Maximum time to wait for the TCP connection to the daemon.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default shell command running the TypeSpec to ebusd CSV converter.
pub const DEFAULT_CONVERSION_CMD: &str =
    "npm exec --package=@ebusd/ebus-typespec tsp2ebusd -- -o ${outFile} ${inFile}";

/// Settings for one bus session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Command-shaping mode.
    pub mode: Mode,
    /// How long to wait for the blank-line terminator of each command.
    pub command_timeout: Duration,
    /// How long to wait for the TCP connection to be established.
    pub connect_timeout: Duration,
    /// Ask the caller for `${input}` interactively instead of using
    /// [`SessionConfig::input`].
    pub interactive: bool,
    /// Pre-supplied replacement for `${input}` when not interactive.
    pub input: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Query,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            interactive: false,
            input: None,
        }
    }
}

impl SessionConfig {
    /// Returns a copy of this config with a different mode.
    pub fn with_mode(&self, mode: Mode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

/// How the external conversion process is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowOption {
    /// Run in a terminal that is not shown to the user.
    #[default]
    No,
    /// Run in a visible terminal (output goes to the user's console).
    Yes,
    /// Run as a tracked background task whose output is logged.
    Task,
}

/// Settings for the conversion orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionConfig {
    /// Shell command template with `${inFile}` and `${outFile}` placeholders.
    pub command_template: String,
    /// Which process runner variant to use.
    pub show: ShowOption,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            command_template: DEFAULT_CONVERSION_CMD.to_string(),
            show: ShowOption::No,
        }
    }
}

/// Policy for picking test commands out of a converted definition set.
///
/// See [`crate::protocol::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Circuit name accepted when nothing matches the requested target.
    /// `None` disables the fallback.
    pub fallback_circuit: Option<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            fallback_circuit: Some(crate::conversion::DEFAULT_CIRCUIT_NAME.to_string()),
        }
    }
}
