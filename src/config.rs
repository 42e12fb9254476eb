//! Server configuration module
//! Handles dynamic configuration parameters for the socket.io server

use crate::constants::{DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT};
use crate::error::{Result, SocketIoError};
use std::env;
use std::path::Path;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum number of simultaneously served connections
    pub max_connections: usize,
    /// Trace every packet crossing a transport
    pub log_packets: bool,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Enable TLS
    pub enable_tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_packets: false,
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl ServerConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("RUSTY_SOCKETIO_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("RUSTY_SOCKETIO_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let max_connections = env::var("RUSTY_SOCKETIO_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let log_packets = env_flag("RUSTY_SOCKETIO_LOG_PACKETS");
        let enable_tls = env_flag("RUSTY_SOCKETIO_ENABLE_TLS");
        let tls_cert_path = env::var("RUSTY_SOCKETIO_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("RUSTY_SOCKETIO_TLS_KEY_PATH").ok();

        let config = Self {
            host,
            port,
            max_connections,
            log_packets,
            tls_cert_path,
            tls_key_path,
            enable_tls,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be served
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(SocketIoError::ConfigError(
                "max_connections must be greater than zero".to_string(),
            ));
        }

        if self.enable_tls {
            let cert_path = self.tls_cert_path.as_deref().ok_or_else(|| {
                SocketIoError::ConfigError(
                    "TLS enabled but RUSTY_SOCKETIO_TLS_CERT_PATH not set".to_string(),
                )
            })?;
            let key_path = self.tls_key_path.as_deref().ok_or_else(|| {
                SocketIoError::ConfigError(
                    "TLS enabled but RUSTY_SOCKETIO_TLS_KEY_PATH not set".to_string(),
                )
            })?;

            if !Path::new(cert_path).exists() {
                return Err(SocketIoError::ConfigError(format!(
                    "TLS certificate file does not exist: {}",
                    cert_path
                )));
            }
            if !Path::new(key_path).exists() {
                return Err(SocketIoError::ConfigError(format!(
                    "TLS private key file does not exist: {}",
                    key_path
                )));
            }
        }

        Ok(())
    }

    /// Address string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT));
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(SocketIoError::ConfigError(_))));
    }

    #[test]
    fn test_tls_requires_existing_files() {
        let config = ServerConfig {
            enable_tls: true,
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CERT_PATH"));

        let config = ServerConfig {
            enable_tls: true,
            tls_cert_path: Some("/nonexistent/cert.pem".to_string()),
            tls_key_path: Some("/nonexistent/key.pem".to_string()),
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
