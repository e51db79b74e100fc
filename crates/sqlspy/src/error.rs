//! Error types for sqlspy

use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Error type of the wrapped driver contract.
///
/// Spy wrappers hand these back exactly as the delegate produced them.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Operation on a closed statement, result set or connection
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Error reported by the database server
    #[error("Database error [{code}]: {message}")]
    Database { code: String, message: String },

    /// Bad parameter index, name or type
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation not supported by this driver
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Value conversion error
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Error from the postgres client
    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Create a database error with a SQLSTATE-like code
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Check if this is a closed-object error
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// SQLSTATE code, if the server reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => Some(code),
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => err.code().map(|c| c.code()),
            _ => None,
        }
    }
}

/// Error raised by an event sink. Contained by the dispatcher.
#[derive(Debug, Error)]
pub enum SinkError {
    /// I/O failure writing the event
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event could not be formatted
    #[error("Sink format error: {0}")]
    Format(String),

    /// Destination unavailable
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// A nested sink panicked
    #[error("Sink panicked: {0}")]
    Panicked(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

/// Error building a configuration snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse error
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid filter pattern
    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid strftime format
    #[error("Invalid date/time format: {0}")]
    InvalidFormat(String),

    /// Config file could not be read
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
}
