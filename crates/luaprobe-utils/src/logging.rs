//! # Logging
//!
//! `tracing` subscriber setup for the Luaprobe command-line tool.
//!
//! Log events go to stderr so they never mix with decoded values printed on
//! stdout. Optionally a second copy goes to a file.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `debug`, `luaprobe_core::decode=trace`)
//! - `LUAPROBE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `LUAPROBE_LOG_FILE`: path of a log file, rotated daily. If the path is an
//!   existing directory, a dated `YYYY-MM-DD-luaprobe.log` is created inside
//!   it instead.
//!
//! ## Example
//!
//! ```rust,no_run
//! use luaprobe_utils::{init_logging_with_level, LogFormat, LogLevel};
//!
//! let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)?;
//! tracing::debug!("logging ready");
//! # Ok::<(), luaprobe_utils::LoggingError>(())
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fmt, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "LUAPROBE_LOG_FORMAT";

/// Environment variable naming the log file
pub const LOG_FILE_ENV: &str = "LUAPROBE_LOG_FILE";

/// Filter used when neither a level nor `RUST_LOG` is given
const DEFAULT_DIRECTIVE: &str = "warn";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format '{s}', expected 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational
    Info,
    /// Decode and registration events
    Debug,
    /// Every field read
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Display::fmt(&Level::from(*self), f)
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "unknown log level '{s}', expected one of error, warn, info, debug, trace"
            )),
        }
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid `RUST_LOG` directives
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// The log file path has no file name
    #[error("Invalid log file path: {}", .0.display())]
    InvalidFile(PathBuf),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

/// Keeps the background file writer alive
///
/// Buffered file output is flushed when this is dropped, so hold it until
/// the program exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    log_file: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// File receiving a copy of the log, if any
    pub fn log_file(&self) -> Option<&Path>
    {
        self.log_file.as_deref()
    }
}

/// Subscriber settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig
{
    /// Explicit level; overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    /// Output format for both console and file
    pub format: LogFormat,
    /// Optional log file (or directory for a dated file)
    pub file: Option<PathBuf>,
}

impl LoggingConfig
{
    /// Read `LUAPROBE_LOG_FORMAT` and `LUAPROBE_LOG_FILE`
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] for an unrecognized format.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var(LOG_FORMAT_ENV) {
            Ok(value) => value.parse().map_err(LoggingError::InvalidFormat)?,
            Err(_) => LogFormat::default(),
        };
        let file = env::var_os(LOG_FILE_ENV).filter(|value| !value.is_empty()).map(PathBuf::from);
        Ok(Self {
            level: None,
            format,
            file,
        })
    }

    /// Install the global subscriber
    ///
    /// ## Errors
    ///
    /// Fails if the filter is invalid, the log file cannot be set up, or a
    /// subscriber is already installed.
    pub fn init(self) -> Result<LoggingGuard, LoggingError>
    {
        let rust_log = env::var("RUST_LOG").ok();
        let directive = filter_directive(self.level, rust_log.as_deref());

        let mut layers = vec![console_layer(self.format, build_filter(&directive)?)];
        let mut worker = None;
        let log_file = match &self.file {
            Some(target) => {
                let (path, rotate) = resolve_log_file(target)?;
                let (writer, guard) = tracing_appender::non_blocking(file_appender(&path, rotate)?);
                layers.push(file_layer(self.format, writer, build_filter(&directive)?));
                worker = Some(guard);
                Some(path)
            }
            None => None,
        };

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

        tracing::debug!(filter = %directive, format = ?self.format, file = ?log_file, "logging initialized");
        Ok(LoggingGuard {
            log_file,
            _worker: worker,
        })
    }
}

/// Initialize logging from the environment
///
/// Equivalent to [`LoggingConfig::from_env`] followed by
/// [`LoggingConfig::init`].
///
/// ## Errors
///
/// See [`LoggingConfig::init`].
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    LoggingConfig::from_env()?.init()
}

/// Initialize logging with an explicit level and format
///
/// `LUAPROBE_LOG_FILE` is still honored.
///
/// ## Errors
///
/// See [`LoggingConfig::init`].
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let config = LoggingConfig {
        level: Some(level),
        format,
        ..LoggingConfig::from_env()?
    };
    config.init()
}

// Explicit level beats RUST_LOG, which beats the default.
fn filter_directive(level: Option<LogLevel>, rust_log: Option<&str>) -> String
{
    match (level, rust_log.map(str::trim).filter(|value| !value.is_empty())) {
        (Some(level), _) => level.to_string().to_lowercase(),
        (None, Some(directives)) => directives.to_string(),
        (None, None) => DEFAULT_DIRECTIVE.to_string(),
    }
}

fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError>
{
    EnvFilter::try_new(directive).map_err(|err| LoggingError::InvalidFilter(format!("{directive}: {err}")))
}

/// Where to log, and whether the file rotates daily
///
/// A directory gets a dated file that never rotates; anything else is used as
/// the base name of a daily-rotated file.
fn resolve_log_file(target: &Path) -> Result<(PathBuf, bool), LoggingError>
{
    if target.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        return Ok((target.join(format!("{today}-luaprobe.log")), false));
    }
    if target.file_name().is_none() {
        return Err(LoggingError::InvalidFile(target.to_path_buf()));
    }
    Ok((target.to_path_buf(), true))
}

fn file_appender(path: &Path, rotate: bool) -> Result<tracing_appender::rolling::RollingFileAppender, LoggingError>
{
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(path.to_path_buf()))?;
    std::fs::create_dir_all(directory)?;

    Ok(if rotate {
        tracing_appender::rolling::daily(directory, file_name)
    } else {
        tracing_appender::rolling::never(directory, file_name)
    })
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);
    match format {
        LogFormat::Pretty => layer.with_ansi(true).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking, filter: EnvFilter) -> BoxedLayer
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_writer(writer);
    match format {
        LogFormat::Pretty => layer.with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::from_str("xml").is_err());
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("Warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
    }

    #[test]
    fn test_filter_precedence()
    {
        assert_eq!(filter_directive(Some(LogLevel::Debug), Some("trace")), "debug");
        assert_eq!(filter_directive(None, Some("luaprobe_core=trace")), "luaprobe_core=trace");
        assert_eq!(filter_directive(None, Some("  ")), DEFAULT_DIRECTIVE);
        assert_eq!(filter_directive(None, None), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn test_invalid_filter_is_reported()
    {
        assert!(build_filter("luaprobe_core=loudest").is_err());
        assert!(build_filter("luaprobe_core::decode=trace,warn").is_ok());
    }

    #[test]
    fn test_directory_gets_dated_file()
    {
        let directory = env::temp_dir();
        let (path, rotate) = resolve_log_file(&directory).unwrap();
        assert!(!rotate);
        assert_eq!(path.parent(), Some(directory.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-luaprobe.log"), "{name}");
    }

    #[test]
    fn test_plain_path_rotates()
    {
        let (path, rotate) = resolve_log_file(Path::new("logs/probe.log")).unwrap();
        assert!(rotate);
        assert_eq!(path, PathBuf::from("logs/probe.log"));
        assert!(resolve_log_file(Path::new("/nonexistent-luaprobe/..")).is_err());
    }
}
