//! Client configuration.
//!
//! [`GcsConfig`] carries what a node publishes about itself in the
//! membership table and the stale-request policy applied by
//! [`GcsClient::expire_stale_requests`](crate::client::GcsClient::expire_stale_requests).
//!
//! # Example
//!
//! ```
//! use gcs_tables::GcsConfig;
//! use std::time::Duration;
//!
//! let config = GcsConfig::new("10.0.0.5", 23_894)
//!     .pending_request_timeout(Duration::from_secs(30));
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Default node manager address.
pub const DEFAULT_NODE_IP_ADDRESS: &str = "127.0.0.1";

/// Configuration for a [`GcsClient`](crate::client::GcsClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    /// IP address of the local node manager, published on connect.
    pub node_ip_address: String,
    /// TCP port of the local node manager, published on connect.
    pub node_manager_port: u16,
    /// How long a one-shot request may wait for its reply before
    /// [`expire_stale_requests`](crate::client::GcsClient::expire_stale_requests)
    /// drops it. `None` keeps pending requests forever.
    pub pending_request_timeout: Option<Duration>,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            node_ip_address: DEFAULT_NODE_IP_ADDRESS.to_string(),
            node_manager_port: 0,
            pending_request_timeout: None,
        }
    }
}

impl GcsConfig {
    /// Create a configuration for a node manager at `address:port`.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            node_ip_address: address.into(),
            node_manager_port: port,
            ..Self::default()
        }
    }

    /// Set the node manager address.
    #[must_use]
    pub fn node_ip_address(mut self, address: impl Into<String>) -> Self {
        self.node_ip_address = address.into();
        self
    }

    /// Set the node manager port.
    #[must_use]
    pub const fn node_manager_port(mut self, port: u16) -> Self {
        self.node_manager_port = port;
        self
    }

    /// Expire one-shot requests older than `timeout`.
    #[must_use]
    pub const fn pending_request_timeout(mut self, timeout: Duration) -> Self {
        self.pending_request_timeout = Some(timeout);
        self
    }

    /// Keep pending requests until their reply arrives.
    #[must_use]
    pub const fn no_pending_request_timeout(mut self) -> Self {
        self.pending_request_timeout = None;
        self
    }

    /// Check that the address parses and the timeout is non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.node_ip_address.parse::<IpAddr>().is_err() {
            return Err(Error::config(format!(
                "node_ip_address {:?} is not an IP address",
                self.node_ip_address
            )));
        }
        if self.pending_request_timeout == Some(Duration::ZERO) {
            return Err(Error::config("pending_request_timeout must be non-zero"));
        }
        Ok(())
    }

    /// Parse and validate a TOML configuration.
    ///
    /// ```toml
    /// node_ip_address = "10.0.0.5"
    /// node_manager_port = 23894
    /// pending_request_timeout_ms = 30000
    /// ```
    ///
    /// Missing keys take their default values.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        let defaults = Self::default();
        let config = Self {
            node_ip_address: raw.node_ip_address.unwrap_or(defaults.node_ip_address),
            node_manager_port: raw.node_manager_port.unwrap_or(defaults.node_manager_port),
            pending_request_timeout: raw.pending_request_timeout_ms.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "config-file")]
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    node_ip_address: Option<String>,
    node_manager_port: Option<u16>,
    pending_request_timeout_ms: Option<u64>,
}
