use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid { field: String, reason: String },

    // Connection errors
    #[error("SSH connection failed for {user}@{host}:{port}\n{log}")]
    Connection {
        user: String,
        host: String,
        port: u16,
        log: String,
    },

    #[error("SSH key invalid or unreadable: {path}")]
    KeyInvalid { path: String },

    // Command execution errors
    #[error("SSH command execution failed: {reason}")]
    Exec { reason: String },

    #[error("Remote command failed for {user}@{host} (exit {exit_code}): `{command}`\n{output}")]
    CommandFailed {
        user: String,
        host: String,
        command: String,
        exit_code: u32,
        output: String,
    },

    // IO errors (stream reading, config file access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
