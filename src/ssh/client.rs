//! russh-backed connection to the head node.
//!
//! One `SshClient` wraps one authenticated SSH connection. Connecting records
//! every protocol-level step into a [`ConnectLog`] so that a failed attempt
//! surfaces the full handshake history in the error instead of a bare cause.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config, Handle, Handler};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{HashAlg, PublicKey, load_secret_key};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::ssh::exec::{ExecResult, run_channel};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How interactive prompts raised during connection setup are answered.
///
/// The head node is pre-trusted infrastructure reached with an unencrypted
/// key, so the policy is fixed: accept its host key, never supply a
/// passphrase or password. Making this an explicit type keeps the decisions
/// auditable in one place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptPolicy;

impl PromptPolicy {
    /// Passphrase offered when decrypting the private key. Always none.
    #[must_use]
    pub const fn passphrase(self) -> Option<&'static str> {
        None
    }

    /// Whether an unknown server host key is accepted.
    #[must_use]
    pub const fn accept_unknown_host(self) -> bool {
        true
    }
}

/// In-memory log of connection setup steps, embedded in connect errors.
#[derive(Debug, Clone, Default)]
pub struct ConnectLog {
    lines: Arc<std::sync::Mutex<Vec<String>>>,
}

impl ConnectLog {
    fn push(&self, line: impl Into<String>) {
        self.lines
            .lock()
            .expect("connect log mutex poisoned")
            .push(line.into());
    }

    fn render(&self) -> String {
        self.lines
            .lock()
            .expect("connect log mutex poisoned")
            .join("\n")
    }
}

/// russh handler applying the [`PromptPolicy`] to host key checks.
struct HeadNodeHandler {
    policy: PromptPolicy,
    log: ConnectLog,
}

impl Handler for HeadNodeHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256);
        self.log.push(format!("server host key: {fingerprint}"));
        Ok(self.policy.accept_unknown_host())
    }
}

/// One authenticated SSH connection to the head node.
pub struct SshClient {
    handle: Handle<HeadNodeHandler>,
    user: String,
    host: String,
}

impl SshClient {
    /// Connect and authenticate with the configured public key.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TCP/SSH handshake fails or times out
    /// - The private key cannot be read or parsed
    /// - The server rejects the public key
    ///
    /// Connection failures embed the recorded setup log for diagnosis.
    #[must_use = "the SSH client must be used or closed"]
    pub async fn connect(config: &PoolConfig) -> Result<Self> {
        let log = ConnectLog::default();
        let policy = PromptPolicy;

        let addr = format!("{}:{}", config.host, config.port);
        log.push(format!("dialing {addr} as {}", config.user));

        let ssh_config = Arc::new(Config::default());
        let handler = HeadNodeHandler {
            policy,
            log: log.clone(),
        };

        let mut handle = match timeout(CONNECT_TIMEOUT, client::connect(ssh_config, &addr, handler))
            .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                log.push(format!("transport setup failed: {e}"));
                return Err(connection_error(config, &log));
            }
            Err(_) => {
                log.push(format!(
                    "connection timeout after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ));
                return Err(connection_error(config, &log));
            }
        };
        log.push("transport established".to_string());

        let expanded = shellexpand::tilde(&config.key_path);
        let key_pair = load_secret_key(Path::new(expanded.as_ref()), policy.passphrase()).map_err(
            |e| {
                debug!(path = %config.key_path, error = %e, "Private key rejected");
                PoolError::KeyInvalid {
                    path: config.key_path.clone(),
                }
            },
        )?;
        log.push(format!("loaded private key from {}", config.key_path));

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let auth_result = match handle
            .authenticate_publickey(&config.user, key_with_hash)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                log.push(format!("authentication error: {e}"));
                return Err(connection_error(config, &log));
            }
        };

        if !auth_result.success() {
            log.push("server rejected public key".to_string());
            return Err(connection_error(config, &log));
        }
        log.push("authenticated".to_string());

        info!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            "SSH connection established"
        );

        Ok(Self {
            handle,
            user: config.user.clone(),
            host: config.host.clone(),
        })
    }

    /// Run a command on the remote host, capturing its output line-by-line.
    ///
    /// A non-zero exit status is reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened or the command cannot
    /// be started.
    pub async fn exec(&self, command: &str) -> Result<ExecResult> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| PoolError::Exec {
                reason: format!("Failed to open channel: {e}"),
            })?;

        run_channel(channel, command).await
    }

    /// Check if the connection is still alive (with a short timeout to avoid
    /// blocking the pool on a dead peer).
    #[must_use = "the connection status should be checked"]
    pub async fn is_connected(&self) -> bool {
        match timeout(PROBE_TIMEOUT, self.handle.channel_open_session()).await {
            Ok(Ok(_)) => true,
            // Channel open failed or timeout, the connection is likely dead
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Close the connection gracefully. Best effort: a peer that no longer
    /// answers is logged and dropped.
    pub async fn close(&self) -> Result<()> {
        match timeout(
            CLOSE_TIMEOUT,
            self.handle
                .disconnect(russh::Disconnect::ByApplication, "", "en"),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(host = %self.host, error = %e, "Error closing SSH connection");
                Ok(())
            }
            Err(_) => {
                warn!(host = %self.host, "Timeout closing SSH connection, forcing drop");
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

fn connection_error(config: &PoolConfig, log: &ConnectLog) -> PoolError {
    PoolError::Connection {
        user: config.user.clone(),
        host: config.host.clone(),
        port: config.port,
        log: log.render(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============== PromptPolicy ==============

    #[test]
    fn test_policy_never_supplies_a_passphrase() {
        assert_eq!(PromptPolicy.passphrase(), None);
    }

    #[test]
    fn test_policy_accepts_unknown_host() {
        assert!(PromptPolicy.accept_unknown_host());
    }

    // ============== ConnectLog ==============

    #[test]
    fn test_log_renders_steps_in_order() {
        let log = ConnectLog::default();
        log.push("dialing head:22");
        log.push("transport established");
        log.push("server rejected public key");

        assert_eq!(
            log.render(),
            "dialing head:22\ntransport established\nserver rejected public key"
        );
    }

    #[test]
    fn test_log_clones_share_the_buffer() {
        let log = ConnectLog::default();
        let view = log.clone();
        log.push("step");
        assert_eq!(view.render(), "step");
    }

    #[test]
    fn test_connection_error_embeds_the_log() {
        let config: PoolConfig = toml::from_str(
            r#"
            user = "alice"
            host = "head.cluster.example"
            key_path = "/keys/id"
            port = 2200
            "#,
        )
        .unwrap();
        let log = ConnectLog::default();
        log.push("transport established");
        log.push("server rejected public key");

        let msg = connection_error(&config, &log).to_string();
        assert!(msg.contains("alice@head.cluster.example:2200"));
        assert!(msg.contains("transport established"));
        assert!(msg.contains("server rejected public key"));
    }
}
