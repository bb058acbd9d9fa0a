//! Errors raised while configuring a disease model.
//!
//! Configuration problems are detected once, when parameters are loaded and a disease is
//! registered, and they name the offending parameter. Runtime failures of the period
//! modification operations are not configuration errors; see [`crate::infection::PeriodError`].

use std::fmt::{self, Debug, Display};
use std::io;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum IxaError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    InvalidParameter { name: String, reason: String },
    LoggingError(String),
    IxaError(String),
}

impl IxaError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        IxaError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for IxaError {
    fn from(error: io::Error) -> Self {
        IxaError::IoError(error)
    }
}

impl From<serde_json::Error> for IxaError {
    fn from(error: serde_json::Error) -> Self {
        IxaError::JsonError(error)
    }
}

impl From<csv::Error> for IxaError {
    fn from(error: csv::Error) -> Self {
        IxaError::CsvError(error)
    }
}

impl From<String> for IxaError {
    fn from(error: String) -> Self {
        IxaError::IxaError(error)
    }
}

impl From<&str> for IxaError {
    fn from(error: &str) -> Self {
        IxaError::IxaError(error.to_string())
    }
}

impl std::error::Error for IxaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IxaError::IoError(error) => Some(error),
            IxaError::JsonError(error) => Some(error),
            IxaError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for IxaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IxaError::IoError(error) => write!(f, "I/O error: {error}"),
            IxaError::JsonError(error) => write!(f, "JSON error: {error}"),
            IxaError::CsvError(error) => write!(f, "CSV error: {error}"),
            IxaError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter `{name}`: {reason}")
            }
            IxaError::LoggingError(error) => write!(f, "Logging error: {error}"),
            IxaError::IxaError(error) => write!(f, "{error}"),
        }
    }
}
