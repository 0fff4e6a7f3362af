//! The network address of an ebusd daemon.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Default ebusd command port.
pub const DEFAULT_PORT: u16 = 8888;

/// Errors raised while building an [`Endpoint`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The host string is empty or whitespace only.
    #[error("ebusd host must not be empty")]
    EmptyHost,

    /// Port 0 is not a connectable TCP port.
    #[error("ebusd port must be in 1..=65535, got {0}")]
    InvalidPort(u32),
}

/// Identifies the ebusd daemon: `(host, port)`.
///
/// Immutable for the lifetime of one session.  The host is kept as a string
/// (not a resolved `SocketAddr`) because ebusd commonly runs on a named host
/// such as `raspberrypi.local`; resolution happens when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates a validated endpoint.
    ///
    /// The port is taken as `u32` so that out-of-range values coming from
    /// configuration files are reported instead of silently truncated.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::EmptyHost`] for a blank host and
    /// [`EndpointError::InvalidPort`] for a port outside `1..=65535`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ebus_core::Endpoint;
    ///
    /// let ep = Endpoint::new("ebusd.local", 8888).unwrap();
    /// assert_eq!(ep.to_string(), "ebusd.local:8888");
    /// assert!(Endpoint::new("ebusd.local", 0).is_err());
    /// ```
    pub fn new(host: impl Into<String>, port: u32) -> Result<Self, EndpointError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(EndpointError::InvalidPort(port))?;
        Ok(Self { host, port })
    }

    /// The daemon host name or IP address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The daemon TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_port_bounds() {
        assert_eq!(Endpoint::new("h", 1).unwrap().port(), 1);
        assert_eq!(Endpoint::new("h", 65535).unwrap().port(), 65535);
    }

    #[test]
    fn test_new_rejects_port_zero() {
        assert_eq!(Endpoint::new("h", 0), Err(EndpointError::InvalidPort(0)));
    }

    #[test]
    fn test_new_rejects_port_above_u16() {
        assert_eq!(
            Endpoint::new("h", 70000),
            Err(EndpointError::InvalidPort(70000))
        );
    }

    #[test]
    fn test_new_rejects_blank_host() {
        assert_eq!(Endpoint::new("  ", 8888), Err(EndpointError::EmptyHost));
    }

    #[test]
    fn test_new_trims_host() {
        let ep = Endpoint::new(" 10.0.0.5 ", 8888).unwrap();
        assert_eq!(ep.host(), "10.0.0.5");
    }

    #[test]
    fn test_display_is_host_colon_port() {
        let ep = Endpoint::new("127.0.0.1", u32::from(DEFAULT_PORT)).unwrap();
        assert_eq!(ep.to_string(), "127.0.0.1:8888");
    }
}
