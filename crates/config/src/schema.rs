//! Config schema types and defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Handler modules the server knows how to install.
pub const KNOWN_MODULES: &[&str] = &["auth", "chat"];

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface the listener binds to.
    pub host: String,
    /// TCP port the listener binds to.
    pub port: u16,
    /// Largest frame accepted in one recv, in bytes.
    pub buffer_size: usize,
    /// Wire text encoding. Only UTF-8 variants are accepted.
    pub encoding: String,
    /// Listener backlog (max pending connections).
    pub connections: u32,
    /// Handler modules whose route tables are installed at startup.
    pub modules: Vec<String>,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Directory for rotated log files.
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 7777,
            buffer_size: 65_536,
            encoding: "utf-8".into(),
            connections: 7,
            modules: KNOWN_MODULES.iter().map(ToString::to_string).collect(),
            db_path: PathBuf::from("db.sqlite"),
            log_dir: PathBuf::from("log"),
        }
    }
}

impl ServerConfig {
    /// The `host:port` pair the listener binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations the server cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid("buffer_size must be positive"));
        }
        if !matches!(
            self.encoding.to_ascii_lowercase().as_str(),
            "utf-8" | "utf8"
        ) {
            return Err(Error::invalid(format!(
                "unsupported encoding '{}', only utf-8 is available",
                self.encoding
            )));
        }
        if self.connections == 0 {
            return Err(Error::invalid("connections must be positive"));
        }
        for module in &self.modules {
            if !KNOWN_MODULES.contains(&module.as_str()) {
                return Err(Error::invalid(format!("unknown module '{module}'")));
            }
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 7777);
        assert_eq!(config.buffer_size, 65_536);
        assert_eq!(config.connections, 7);
        assert_eq!(config.modules, vec!["auth", "chat"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = ServerConfig {
            host: "0.0.0.0".into(),
            port: 40_000,
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "0.0.0.0:40000");
    }

    #[test]
    fn rejects_unknown_encoding() {
        let config = ServerConfig {
            encoding: "koi8-r".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_module() {
        let config = ServerConfig {
            modules: vec!["auth".into(), "voice".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: ServerConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.buffer_size, 65_536);
    }
}
