//! Server configuration.
//!
//! A fixed set of options, merged over [`Config::default`] with struct-update
//! syntax and frozen once handed to [`App::builder`](crate::App::builder):
//!
//! ```rust
//! use halyard::{AccessPolicy, Config};
//!
//! let config = Config {
//!     app: "inventory".into(),
//!     allow_from: AccessPolicy::LocalOnly,
//!     fail_hard: true,
//!     ..Config::default()
//! };
//! assert_eq!(config.log_file_path(), "/var/log/halyard.inventory.log");
//! ```

use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::Dispatch;

/// Placeholder replaced by [`Config::app`] in [`Config::log_file`].
pub const APP_PLACEHOLDER: &str = "{app}";

/// Recognised server options.
#[derive(Clone)]
pub struct Config {
    /// Application name; fills the `{app}` placeholder of `log_file`.
    pub app: String,
    /// Application root directory.
    pub root: PathBuf,
    /// Logger every request runs under. `None` uses the global default.
    pub logger: Option<Dispatch>,
    /// Log file path template.
    pub log_file: String,
    /// `EnvFilter` directive, e.g. `info` or `halyard=debug,warn`.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Which requests are admitted before routing.
    pub allow_from: AccessPolicy,
    /// Abort the process on unexpected defects instead of answering 500.
    pub fail_hard: bool,
}

impl Config {
    /// `log_file` with `{app}` substituted.
    pub fn log_file_path(&self) -> String {
        self.log_file.replace(APP_PLACEHOLDER, &self.app)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: env!("CARGO_PKG_NAME").to_owned(),
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            logger: None,
            log_file: "/var/log/halyard.{app}.log".to_owned(),
            log_level: "info".to_owned(),
            log_format: LogFormat::Full,
            allow_from: AccessPolicy::All,
            fail_hard: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app", &self.app)
            .field("root", &self.root)
            .field("logger", &self.logger.is_some())
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("allow_from", &self.allow_from)
            .field("fail_hard", &self.fail_hard)
            .finish()
    }
}

// ── LogFormat ─────────────────────────────────────────────────────────────────

/// Line format of the built-in loggers (see [`logging`](crate::logging)).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Timestamp, level, target, span context and message.
    #[default]
    Full,
    /// Single-line abbreviated output.
    Compact,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`; use full, compact, or json")),
        }
    }
}

// ── AccessPolicy ──────────────────────────────────────────────────────────────

/// The `allow_from` rule applied to every request before routing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AccessPolicy {
    /// Admit everything.
    #[default]
    All,
    /// Only clients announcing a `Halyard::Client(x.y.z)` user agent.
    RestrictedClient,
    /// Only loopback remote addresses.
    LocalOnly,
    /// A value nobody recognises. Requests are admitted with a warning.
    Unrecognized(String),
}

impl AccessPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::RestrictedClient => "restricted-client",
            Self::LocalOnly => "local-only",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Never fails: unknown strings become [`AccessPolicy::Unrecognized`].
impl FromStr for AccessPolicy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Self::All,
            "restricted-client" | "clients" => Self::RestrictedClient,
            "local-only" | "local" => Self::LocalOnly,
            _ => Self::Unrecognized(s.to_owned()),
        })
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
