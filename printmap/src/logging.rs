//! Logging setup.
//!
//! Log output goes to a file under the configured directory and, optionally,
//! to stdout. The filter comes from `RUST_LOG` when set and falls back to the
//! configured default level otherwise.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::config_directory;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "printmap.log";

/// Default level when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Keeps the background log writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    directory: PathBuf,
    file_name: String,
    stdout: bool,
    default_level: String,
}

impl LoggingOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_name: DEFAULT_LOG_FILE.to_string(),
            stdout: true,
            default_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn with_stdout(mut self, enabled: bool) -> Self {
        self.stdout = enabled;
        self
    }

    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self::new(default_log_dir())
    }
}

/// `logs` under the configuration directory.
pub fn default_log_dir() -> PathBuf {
    config_directory().join("logs")
}

/// Installs the global subscriber. Each run starts with an empty log file.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, LoggingError> {
    let path = prepare_log_file(options)?;

    let appender = tracing_appender::rolling::never(&options.directory, &options.file_name);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .compact()
            .boxed()
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(options: &LoggingOptions) -> Result<PathBuf, LoggingError> {
    let path = options.log_path();
    let io_error = |source: io::Error| LoggingError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(&options.directory).map_err(io_error)?;
    fs::write(&path, "").map_err(io_error)?;
    Ok(path)
}
