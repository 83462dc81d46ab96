//! Logger construction.
//!
//! halyard logs through [`tracing`]. These helpers turn the `log_level` and
//! `log_format` options into a ready [`Dispatch`] you can store in
//! [`Config::logger`] or install globally:
//!
//! ```rust,no_run
//! use halyard::{Config, logging};
//!
//! let mut config = Config::default();
//! config.logger = Some(logging::stdout_dispatch(&config).expect("valid log level"));
//! ```

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::{Config, LogFormat};
use crate::error::ServeError;

/// Logger writing to standard output.
pub fn stdout_dispatch(config: &Config) -> Result<Dispatch, ServeError> {
    build(config, io::stdout, true)
}

/// Logger appending to [`Config::log_file_path`]. Missing parent directories
/// are created.
pub fn file_dispatch(config: &Config) -> Result<Dispatch, ServeError> {
    let path = config.log_file_path();
    if let Some(parent) = Path::new(&path).parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    build(config, Mutex::new(file), false)
}

fn build<W>(config: &Config, writer: W, ansi: bool) -> Result<Dispatch, ServeError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.log_level).map_err(|e| ServeError::LogLevel {
        level: config.log_level.clone(),
        message: e.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);

    let dispatch = match config.log_format {
        LogFormat::Full => Dispatch::new(builder.finish()),
        LogFormat::Compact => Dispatch::new(builder.compact().finish()),
        LogFormat::Json => Dispatch::new(builder.json().finish()),
    };
    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_levels() {
        let config = Config { log_level: "halyard=loud".into(), ..Config::default() };
        assert!(matches!(stdout_dispatch(&config), Err(ServeError::LogLevel { .. })));
    }

    #[test]
    fn file_logger_writes_to_the_resolved_path() {
        let dir = std::env::temp_dir().join(format!("halyard-logging-{}", std::process::id()));
        let config = Config {
            app: "probe".into(),
            log_file: dir.join("halyard.{app}.log").to_string_lossy().into_owned(),
            log_format: LogFormat::Compact,
            ..Config::default()
        };

        let dispatch = file_dispatch(&config).expect("file logger");
        tracing::dispatcher::with_default(&dispatch, || tracing::info!("hello from the probe"));

        let written = fs::read_to_string(dir.join("halyard.probe.log")).expect("log file");
        assert!(written.contains("hello from the probe"));
        let _ = fs::remove_dir_all(dir);
    }
}
