//! # Luaprobe Utilities
//!
//! Shared helpers for the Luaprobe workspace. Currently this is the logging
//! setup used by the command-line tool; the core library only emits
//! `tracing` events and never installs a subscriber itself.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingConfig, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
