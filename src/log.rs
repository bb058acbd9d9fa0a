//! Console logging backed by `log4rs`.
//!
//! The crate logs through the `log` facade; nothing is printed until [`init_logging`] installs
//! the console appender. Calling it again, or calling [`set_log_level`], reconfigures the
//! installed logger through its handle.

use crate::error::IxaError;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;
use parking_lot::Mutex;
use std::sync::OnceLock;

pub use ::log::{debug, error, info, trace, warn, LevelFilter};

const CONSOLE_APPENDER: &str = "stdout";
const DEFAULT_PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";

static LOG_HANDLE: OnceLock<Mutex<Handle>> = OnceLock::new();

fn console_config(level: LevelFilter) -> Result<Config, IxaError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(stdout)))
        .build(Root::builder().appender(CONSOLE_APPENDER).build(level))
        .map_err(|errors| IxaError::LoggingError(errors.to_string()))
}

/// Installs the console logger at `level`, or changes the level if it is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), IxaError> {
    let config = console_config(level)?;
    if let Some(handle) = LOG_HANDLE.get() {
        handle.lock().set_config(config);
        return Ok(());
    }

    let handle =
        log4rs::init_config(config).map_err(|error| IxaError::LoggingError(error.to_string()))?;
    // A concurrent initializer may have won; its handle stays authoritative.
    let _ = LOG_HANDLE.set(Mutex::new(handle));
    Ok(())
}

pub fn set_log_level(level: LevelFilter) -> Result<(), IxaError> {
    init_logging(level)
}

/// Parses a level name from configuration (`"info"`, `"TRACE"`, ...).
pub fn parse_level(name: &str) -> Result<LevelFilter, IxaError> {
    name.parse::<LevelFilter>()
        .map_err(|_| IxaError::invalid_parameter("log_level", format!("unknown level `{name}`")))
}
