//! Socket Configuration
//!
//! Settings shared by [`SocketClient`](crate::SocketClient) and
//! [`SocketServer`](crate::SocketServer). Loadable from a TOML file with
//! `EXCHANGE_SOCKET_*` environment overrides.

use crate::address::{AddressSpec, Family};
use crate::{Result, TransportError};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Default maximum payload of one framed message (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default mode applied to Unix socket files after bind
pub const DEFAULT_UNIX_SOCKET_PERMISSIONS: u32 = 0o700;

/// Largest UDP payload (65507) minus the 4-byte length prefix
pub const UDP_MAX_MESSAGE_SIZE: usize = 65507 - crate::serializer::FRAME_HEADER_LEN;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "EXCHANGE_SOCKET";

/// Socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// `"<data-model>:<serializer>:<family>:<address>"`
    pub address: String,
    /// Mode applied to the socket file of filesystem-backed families
    pub unix_socket_permissions: u32,
    /// Scratch buffer capacity and framing limit, in bytes
    pub max_message_size: usize,
    /// Connections opened by [`SocketClient::connect`](crate::SocketClient::connect)
    pub pool_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            unix_socket_permissions: DEFAULT_UNIX_SOCKET_PERMISSIONS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            pool_size: 1,
        }
    }
}

impl SocketConfig {
    /// Configuration with defaults for everything but the address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file with environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading socket config: {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TransportError::configuration(format!("Failed to build configuration: {e}"), None))?;

        config
            .try_deserialize()
            .map_err(|e| TransportError::configuration(format!("Failed to deserialize configuration: {e}"), None))
    }

    /// Parse the address and check the limits, once, at startup
    pub fn validate(&self) -> Result<AddressSpec> {
        let spec = AddressSpec::parse(&self.address)?;

        if self.max_message_size == 0 {
            return Err(TransportError::configuration(
                "max_message_size must be greater than zero",
                Some("max_message_size"),
            ));
        }
        if self.pool_size == 0 {
            return Err(TransportError::configuration(
                "pool_size must be greater than zero",
                Some("pool_size"),
            ));
        }
        if self.unix_socket_permissions > 0o7777 {
            return Err(TransportError::configuration(
                format!("invalid socket permissions {:o}", self.unix_socket_permissions),
                Some("unix_socket_permissions"),
            ));
        }

        Ok(spec)
    }

    /// Framing limit for the given family; UDP cannot carry more than one packet
    pub fn effective_max_message_size(&self, family: Family) -> usize {
        if family == Family::Udp && self.max_message_size > UDP_MAX_MESSAGE_SIZE {
            debug!(
                configured = self.max_message_size,
                limit = UDP_MAX_MESSAGE_SIZE,
                "Clamping max message size to UDP payload limit"
            );
            UDP_MAX_MESSAGE_SIZE
        } else {
            self.max_message_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SocketConfig::new("raw:native:unix:/tmp/a.sock");
        assert_eq!(config.unix_socket_permissions, 0o700);
        assert_eq!(config.max_message_size, 64 * 1024);
        assert_eq!(config.pool_size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = SocketConfig {
            max_message_size: 0,
            ..SocketConfig::new("raw:native:tcp:127.0.0.1:1")
        };
        assert!(matches!(
            config.validate(),
            Err(TransportError::Configuration { field: Some(f), .. }) if f == "max_message_size"
        ));
    }

    #[test]
    fn test_validate_surfaces_address_errors() {
        let config = SocketConfig::new("raw:native");
        assert!(matches!(config.validate(), Err(TransportError::MalformedAddress { .. })));
    }

    #[test]
    fn test_udp_limit_is_clamped() {
        let config = SocketConfig::new("raw:native:udp:127.0.0.1:1");
        assert_eq!(config.effective_max_message_size(Family::Udp), UDP_MAX_MESSAGE_SIZE);
        assert_eq!(config.effective_max_message_size(Family::Tcp), DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "address = \"structured:json:tcp:127.0.0.1:9000\"").unwrap();
        writeln!(file, "max_message_size = 4096").unwrap();
        writeln!(file, "pool_size = 4").unwrap();

        let config = SocketConfig::load(&path).unwrap();
        assert_eq!(config.address, "structured:json:tcp:127.0.0.1:9000");
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.unix_socket_permissions, DEFAULT_UNIX_SOCKET_PERMISSIONS);
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let err = SocketConfig::load(Path::new("/nonexistent/socket.toml")).unwrap_err();
        assert!(err.is_configuration());
    }
}
