//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\EbusNotebook\config.toml`
//! - Linux:    `~/.config/ebus-notebook/config.toml`
//! - macOS:    `~/Library/Application Support/EbusNotebook/config.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [ebusd]
//! host = "127.0.0.1"
//! port = 8888
//! timeout_ms = 3000
//!
//! [conversion]
//! show = "task"
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section and a
//! missing key all fall back to the built-in behaviour.  Operations never read
//! this struct directly: `main.rs` converts it once into `ebus_core` values via
//! [`AppConfig::endpoint`], [`AppConfig::session_config`],
//! [`AppConfig::conversion_config`] and [`AppConfig::selection_policy`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ebus_core::conversion::DEFAULT_CIRCUIT_NAME;
use ebus_core::domain::config::DEFAULT_CONVERSION_CMD;
use ebus_core::domain::endpoint::DEFAULT_PORT;
use ebus_core::{
    ConversionConfig, Endpoint, EndpointError, Mode, SelectionPolicy, SessionConfig, ShowOption,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ebusd: EbusdConfig,
    #[serde(default)]
    pub conversion: ConversionSection,
    #[serde(default)]
    pub send: SendSection,
    #[serde(default)]
    pub selection: SelectionSection,
}

/// Where ebusd listens and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EbusdConfig {
    /// Without a host nothing is sent to ebusd.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-command response window in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// The external converter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionSection {
    /// Shell command with `${inFile}` and `${outFile}` placeholders.
    #[serde(default = "default_conversion_cmd")]
    pub cmd: String,
    #[serde(default)]
    pub show: ShowOption,
}

/// Command shaping for test commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SendSection {
    /// Custom template replacing the default read command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Ask for `${input}` on every send.
    #[serde(default)]
    pub interactive: bool,
}

/// Test-command selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionSection {
    /// Circuit used when nothing matches the target; `""` disables it.
    #[serde(default = "default_fallback_circuit")]
    pub fallback_circuit: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout_ms() -> u64 {
    3000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_conversion_cmd() -> String {
    DEFAULT_CONVERSION_CMD.to_string()
}
fn default_fallback_circuit() -> String {
    DEFAULT_CIRCUIT_NAME.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ebusd: EbusdConfig::default(),
            conversion: ConversionSection::default(),
            send: SendSection::default(),
            selection: SelectionSection::default(),
        }
    }
}

impl Default for EbusdConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for ConversionSection {
    fn default() -> Self {
        Self {
            cmd: default_conversion_cmd(),
            show: ShowOption::default(),
        }
    }
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            fallback_circuit: default_fallback_circuit(),
        }
    }
}

// ── Conversion into core values ───────────────────────────────────────────────

impl AppConfig {
    /// The configured daemon, or `None` when no host is set.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the configured values are invalid.
    pub fn endpoint(&self) -> Result<Option<Endpoint>, EndpointError> {
        match self.ebusd.host.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(host) => Endpoint::new(host, u32::from(self.ebusd.port)).map(Some),
        }
    }

    /// Session settings: Query mode, or the custom format when one is set.
    pub fn session_config(&self) -> SessionConfig {
        let mode = match &self.send.format {
            Some(template) if !template.trim().is_empty() => Mode::CustomFormat(template.clone()),
            _ => Mode::Query,
        };
        SessionConfig {
            mode,
            command_timeout: Duration::from_millis(self.ebusd.timeout_ms),
            connect_timeout: Duration::from_millis(self.ebusd.connect_timeout_ms),
            interactive: self.send.interactive,
            input: None,
        }
    }

    pub fn conversion_config(&self) -> ConversionConfig {
        ConversionConfig {
            command_template: self.conversion.cmd.clone(),
            show: self.conversion.show,
        }
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        let circuit = self.selection.fallback_circuit.trim();
        SelectionPolicy {
            fallback_circuit: (!circuit.is_empty()).then(|| circuit.to_string()),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("config.toml"))
}

/// Loads the config from the platform path; defaults when absent.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to the platform path.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("EbusNotebook"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ebus-notebook"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("EbusNotebook")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
