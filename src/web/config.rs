//! Web server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SystemError};

/// Where the dashboard listens and what it serves besides `/api/*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Send permissive CORS headers so the API can be polled cross-origin
    pub enable_cors: bool,
    /// Directory holding the dashboard's static files, `None` for API only
    pub static_dir: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", crate::DEFAULT_WEB_PORT)
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            enable_cors: true,
            static_dir: Some(PathBuf::from("public")),
        }
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Serve static files from `dir` for every path outside `/api`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn without_static_files(mut self) -> Self {
        self.static_dir = None;
        self
    }

    /// Parse `host:port` into a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                SystemError::config_error(format!(
                    "Invalid bind address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = WebConfig::new("127.0.0.1", 9090);
        assert_eq!(config.bind_address().unwrap(), "127.0.0.1:9090".parse().unwrap());

        let bad = WebConfig::new("not a host", 80);
        assert!(matches!(bad.bind_address(), Err(SystemError::Config(_))));
    }
}
