//! Configuration for the hub server.
//!
//! Priority (highest first): CLI arguments, environment variables (via
//! clap `env`), TOML file (`~/.config/workpulse-hub/config.toml`),
//! compiled defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::hub::{DEFAULT_BROADCAST_CAPACITY, DEFAULT_KEEP_ALIVE};

/// Errors that can occur when loading hub configuration.
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
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    accepted_tokens: Option<Vec<String>>,
    broadcast_capacity: Option<usize>,
    keep_alive_secs: Option<u64>,
}

/// CLI arguments for the hub.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "WorkPulse development push hub")]
pub struct HubCliArgs {
    /// Address to bind the hub to.
    #[arg(short, long, env = "HUB_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/workpulse-hub/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Accept only clients presenting this bearer token. Repeatable.
    #[arg(long = "token")]
    pub tokens: Vec<String>,

    /// Frames buffered per client before it starts dropping them.
    #[arg(long)]
    pub broadcast_capacity: Option<usize>,

    /// Seconds between keep-alive pings to idle clients.
    #[arg(long)]
    pub keep_alive_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "HUB_LOG")]
    pub log_level: String,
}

/// Fully resolved hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind the server to.
    pub bind_addr: String,
    /// Accepted bearer tokens; empty accepts every client.
    pub accepted_tokens: Vec<String>,
    /// Per-client frame buffer.
    pub broadcast_capacity: usize,
    /// Interval between keep-alive pings.
    pub keep_alive: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5080".to_string(),
            accepted_tokens: Vec::new(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// An explicit `--config` that does not exist is an error; a missing
    /// default file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Tokens given on the command line replace the file's list.
    fn resolve(cli: &HubCliArgs, file: &HubConfigFile) -> Self {
        let defaults = Self::default();

        let accepted_tokens = if cli.tokens.is_empty() {
            file.server
                .accepted_tokens
                .clone()
                .unwrap_or(defaults.accepted_tokens)
        } else {
            cli.tokens.clone()
        };

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            accepted_tokens,
            broadcast_capacity: cli
                .broadcast_capacity
                .or(file.server.broadcast_capacity)
                .unwrap_or(defaults.broadcast_capacity),
            keep_alive: cli
                .keep_alive_secs
                .or(file.server.keep_alive_secs)
                .map_or(defaults.keep_alive, Duration::from_secs),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<HubConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(HubConfigFile::default());
        };
        config_dir.join("workpulse-hub").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
