//! Configuration system for the `WorkPulse` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/workpulse/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use workpulse_proto::employee::Role;
use workpulse_proto::task::UserId;

use crate::transport::TransportError;
use crate::transport::ws::hub_url;

/// Errors that can occur when loading configuration.
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

    /// A value was present but not usable.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    reconnect: ReconnectFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    hub_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// `[reconnect]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReconnectFileConfig {
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    server_timeout_ms: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    token: Option<String>,
    user_id: Option<i64>,
    role: Option<Role>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    notification_window: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Reconnection policy of the push channel.
///
/// The delay before attempt `n` (1-based) is `initial_delay * 2^(n-1)`,
/// capped at `max_delay`. The attempt counter resets after every
/// successful connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the exponential backoff.
    pub max_delay: Duration,
    /// Consecutive failed connection attempts, the first one included,
    /// before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// A live connection that delivers nothing, not even a keep-alive,
    /// for this long is dropped and re-established.
    pub server_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            server_timeout: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before reconnection attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- API --
    /// REST base URL, e.g. `https://portal.example.com/api`.
    pub api_base_url: Option<String>,
    /// Explicit hub URL. Derived from `api_base_url` when absent.
    pub hub_url: Option<String>,
    /// Timeout for one REST request.
    pub request_timeout: Duration,
    /// Timeout for one push connection attempt.
    pub connect_timeout: Duration,

    // -- Reconnect --
    /// Push channel reconnection policy.
    pub reconnect: ReconnectConfig,

    // -- Session --
    /// Bearer token.
    pub token: Option<String>,
    /// Signed-in user.
    pub user_id: Option<UserId>,
    /// Role of the signed-in user.
    pub role: Role,

    // -- UI --
    /// Number of notifications kept for display.
    pub notification_window: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            hub_url: None,
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            token: None,
            user_id: None,
            role: Role::Employee,
            notification_window: 10,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if the resolved values are inconsistent.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: cli
                .api_base_url
                .clone()
                .or_else(|| file.api.base_url.clone()),
            hub_url: cli.hub_url.clone().or_else(|| file.api.hub_url.clone()),
            request_timeout: file
                .api
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            connect_timeout: file
                .api
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            reconnect: ReconnectConfig {
                initial_delay: file
                    .reconnect
                    .initial_delay_ms
                    .map_or(defaults.reconnect.initial_delay, Duration::from_millis),
                max_delay: file
                    .reconnect
                    .max_delay_ms
                    .map_or(defaults.reconnect.max_delay, Duration::from_millis),
                max_attempts: cli
                    .max_attempts
                    .or(file.reconnect.max_attempts)
                    .or(defaults.reconnect.max_attempts),
                server_timeout: file
                    .reconnect
                    .server_timeout_ms
                    .map_or(defaults.reconnect.server_timeout, Duration::from_millis),
            },
            token: cli.token.clone().or_else(|| file.session.token.clone()),
            user_id: cli.user_id.or(file.session.user_id).map(UserId),
            role: cli.role.or(file.session.role).unwrap_or(defaults.role),
            notification_window: file
                .ui
                .notification_window
                .unwrap_or(defaults.notification_window),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect.max_delay < self.reconnect.initial_delay {
            return Err(ConfigError::Invalid {
                key: "reconnect.max_delay_ms",
                reason: "must not be smaller than initial_delay_ms".to_string(),
            });
        }
        if self.reconnect.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                key: "reconnect.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reconnect.server_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "reconnect.server_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.notification_window == 0 {
            return Err(ConfigError::Invalid {
                key: "ui.notification_window",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// URL of the push hub: the explicit `hub_url`, or one derived from
    /// the API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] if neither is configured or the
    /// base URL cannot be converted.
    pub fn push_endpoint(&self) -> Result<String, TransportError> {
        if let Some(url) = &self.hub_url {
            return Ok(url.clone());
        }
        let base = self.api_base_url.as_deref().ok_or_else(|| {
            TransportError::Protocol("no API base URL or hub URL configured".to_string())
        })?;
        hub_url(base)
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Live view of the WorkPulse task board and notifications")]
pub struct CliArgs {
    /// REST API base URL.
    #[arg(long = "api", env = "WORKPULSE_API")]
    pub api_base_url: Option<String>,

    /// Notification hub URL (default: derived from the API base URL).
    #[arg(long, env = "WORKPULSE_HUB")]
    pub hub_url: Option<String>,

    /// Bearer token for the API and the hub.
    #[arg(long, env = "WORKPULSE_TOKEN")]
    pub token: Option<String>,

    /// Signed-in user id, used for the "my tasks" scopes.
    #[arg(long, env = "WORKPULSE_USER")]
    pub user_id: Option<i64>,

    /// Role of the signed-in user.
    #[arg(long, value_parser = parse_role)]
    pub role: Option<Role>,

    /// Give up after this many consecutive failed connection attempts.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Move a task to another column once the board is loaded: `ID=STATUS`.
    #[arg(long = "move", value_name = "ID=STATUS")]
    pub move_task: Option<String>,

    /// Path to config file (default: `~/.config/workpulse/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "WORKPULSE_LOG")]
    pub log_level: String,

    /// Path to log file (default: stderr).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("workpulse").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
