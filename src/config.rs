//! Gateway configuration
//!
//! Loaded once at startup (JSON file, then CLI overrides) and shared
//! read-only as `Arc<GatewayConfig>`. The operating mode has no setter.

use crate::history::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Origin trusted by the private API when the gateway is not open
pub const DEFAULT_ORIGIN: &str = "https://wallet.hycon.io";

pub const DEFAULT_PORT: u16 = 2442;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Public/private operating switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayMode {
    /// Serve only the public API; private routes are never registered
    pub public_rest: bool,
    /// Accept connections from other hosts
    pub non_local: bool,
}

impl GatewayMode {
    /// Any origin is allowed and the listener binds all interfaces
    pub fn is_open(&self) -> bool {
        self.public_rest || self.non_local
    }

    pub fn serves_private(&self) -> bool {
        !self.public_rest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub port: u16,
    /// Canonical wallet origin allowed by CORS in closed mode
    pub origin: String,
    #[serde(flatten)]
    pub mode: GatewayMode,
    /// Items per history page
    pub page_size: usize,
    /// Deadline for synchronous collaborator calls
    pub timeout_secs: u64,
    /// Deadline for each webhook delivery
    pub webhook_timeout_secs: u64,
    /// Base URL of a running node; the in-memory sandbox when absent
    pub upstream: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            origin: DEFAULT_ORIGIN.to_string(),
            mode: GatewayMode::default(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 10,
            webhook_timeout_secs: 10,
            upstream: None,
        }
    }
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("pageSize must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeoutSecs must be at least 1".into()));
        }
        if self.webhook_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "webhookTimeoutSecs must be at least 1".into(),
            ));
        }
        if self.origin.trim().is_empty() {
            return Err(ConfigError::Invalid("origin must not be empty".into()));
        }
        if let Some(upstream) = &self.upstream {
            url::Url::parse(upstream)
                .map_err(|e| ConfigError::Invalid(format!("upstream '{}': {}", upstream, e)))?;
        }
        Ok(())
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    /// Loopback unless the gateway is open
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.mode.is_open() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        SocketAddr::new(ip, self.port)
    }
}
