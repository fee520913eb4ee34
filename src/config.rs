use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoolError, Result};

/// Connection pool configuration, loaded once at startup.
///
/// Describes the single head node the pool talks to. All connections are
/// authenticated with the public key at `key_path`; no password or
/// passphrase path exists.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Remote login user (default: the current OS user)
    #[serde(default = "default_user")]
    pub user: String,

    /// Head node hostname or IP
    pub host: String,

    /// Path to the private key file (tilde-expanded)
    pub key_path: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of pre-allocated pool slots
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Quiet period after which an idle session is disconnected
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl PoolConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_default()
}

const fn default_port() -> u16 {
    22
}

const fn default_max_connections() -> usize {
    8
}

const fn default_idle_timeout() -> u64 {
    300
}

/// Load pool configuration from a TOML file
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file does not exist
/// - The file cannot be read
/// - The TOML content is invalid or cannot be parsed
/// - The configuration fails validation (empty host/user/key, zero pool size)
pub fn load_config(path: &Path) -> Result<PoolConfig> {
    if !path.exists() {
        return Err(PoolError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let config: PoolConfig = toml::from_str(&content)?;

    validate_config(&config)?;

    debug!(
        host = %config.host,
        port = config.port,
        slots = config.max_connections,
        "Pool configuration loaded"
    );

    Ok(config)
}

/// Validate the configuration
pub fn validate_config(config: &PoolConfig) -> Result<()> {
    if config.host.is_empty() {
        return Err(PoolError::ConfigInvalid {
            field: "host".to_string(),
            reason: "Host cannot be empty".to_string(),
        });
    }

    if config.user.is_empty() {
        return Err(PoolError::ConfigInvalid {
            field: "user".to_string(),
            reason: "User cannot be empty and no OS username was found".to_string(),
        });
    }

    if config.key_path.is_empty() {
        return Err(PoolError::ConfigInvalid {
            field: "key_path".to_string(),
            reason: "Key path cannot be empty".to_string(),
        });
    }

    if config.max_connections == 0 {
        return Err(PoolError::ConfigInvalid {
            field: "max_connections".to_string(),
            reason: "Pool must hold at least one connection".to_string(),
        });
    }

    Ok(())
}
