//! error.rs
//!
//! error types shared by the store, the settings loader and the event generator

use std::fmt;

/// Failures talking to the trade store
///
/// `Connectivity` is only produced while establishing the initial pool and is fatal to the process.
/// `Operation` covers anything that goes wrong during a single insert/update/delete/commit and is
/// recovered by the generator loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Connectivity(String),
    Operation(String),
}

impl StoreError {
    pub fn connectivity(e: sqlx::Error) -> StoreError {
        StoreError::Connectivity(e.to_string())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connectivity(msg) => write!(f, "could not reach the trade store: {}", msg),
            StoreError::Operation(msg) => write!(f, "trade store operation failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// anything sqlx reports mid-operation (constraint violation, serialization conflict, dropped
// connection) is an operation failure
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Operation(e.to_string())
    }
}

/// Missing or malformed connection settings
#[derive(Debug)]
pub enum SettingsError {
    Load(config::ConfigError),
    Missing(&'static str),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Load(e) => write!(f, "could not load database settings: {}", e),
            SettingsError::Missing(name) => write!(f, "missing required environment variable: {}", name),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Load(e) => Some(e),
            SettingsError::Missing(_) => None,
        }
    }
}

impl From<config::ConfigError> for SettingsError {
    fn from(e: config::ConfigError) -> Self {
        SettingsError::Load(e)
    }
}

/// The target rate must be a positive, finite number of operations per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidRate(pub f64);

impl fmt::Display for InvalidRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate must be a positive number of operations per second, got {}", self.0)
    }
}

impl std::error::Error for InvalidRate {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let e = StoreError::Operation("duplicate key".to_string());
        assert_eq!(e.to_string(), "trade store operation failed: duplicate key");

        let e = StoreError::Connectivity("connection refused".to_string());
        assert_eq!(e.to_string(), "could not reach the trade store: connection refused");
    }

    #[test]
    fn sqlx_errors_are_operation_failures() {
        let e: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(e, StoreError::Operation(_)));
    }

    #[test]
    fn settings_error_display() {
        let e = SettingsError::Missing("STOCK_EVENTS_DB_USER");
        assert_eq!(e.to_string(), "missing required environment variable: STOCK_EVENTS_DB_USER");
    }
}
