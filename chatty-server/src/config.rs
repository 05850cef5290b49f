//! Configuration for the Chatty server.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (`CHATTY_ADDR`, `CHATTY_LOG`, via clap `env`)
//! 3. TOML config file (`~/.config/chatty/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use crate::notifications::DEFAULT_MAX_NOTIFICATIONS;
use crate::server::{DEFAULT_READ_BUFFER_SIZE, ServerOptions};

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The log file path does not name a file.
    #[error("log file path has no file name: {}", .0.display())]
    InvalidLogFile(PathBuf),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChattyConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    read_buffer_size: Option<usize>,
    max_notifications: Option<usize>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Chatty chat server")]
pub struct ServerCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "CHATTY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/chatty/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest request accepted in one read, in bytes.
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// Pending notifications kept per user before the oldest are dropped.
    #[arg(long)]
    pub max_notifications: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATTY_LOG")]
    pub log_level: String,

    /// Also write logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `127.0.0.1:3000`).
    pub bind_addr: String,
    /// Per-connection read buffer, in bytes.
    pub read_buffer_size: usize,
    /// Notification queue cap per user.
    pub max_notifications: usize,
    /// Log level filter string.
    pub log_level: String,
    /// Optional log file.
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_notifications: DEFAULT_MAX_NOTIFICATIONS,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// An explicit `--config` path must exist. Without one, the default path
    /// is tried and a missing file counts as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if `--log-file` does not name a file.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        if let Some(path) = &config.log_file {
            check_log_file(path)?;
        }
        Ok(config)
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ChattyConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            read_buffer_size: cli
                .read_buffer_size
                .or(file.server.read_buffer_size)
                .unwrap_or(defaults.read_buffer_size),
            max_notifications: cli
                .max_notifications
                .or(file.server.max_notifications)
                .unwrap_or(defaults.max_notifications),
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        }
    }

    /// Connection-level options for [`crate::server::start_server`].
    #[must_use]
    pub const fn server_options(&self) -> ServerOptions {
        ServerOptions {
            read_buffer_size: self.read_buffer_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatty").join("config.toml"))
}

/// The log appender needs both a directory and a file name.
fn check_log_file(path: &Path) -> Result<(), ConfigError> {
    if path.parent().is_none() || path.file_name().is_none() {
        return Err(ConfigError::InvalidLogFile(path.to_path_buf()));
    }
    Ok(())
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<ChattyConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(path) = default_config_path() else {
        return Ok(ChattyConfigFile::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChattyConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
