// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Platform error: {platform} - {message}")]
    PlatformError {
        platform: String,
        message: String,
    },

    #[error("SMTP error: {0}")]
    SmtpError(String),

    #[error("Timeout error: {operation} exceeded {seconds} seconds")]
    TimeoutError {
        operation: String,
        seconds: u64,
    },

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl FinderError {
    /// Wrap an I/O failure together with the path it happened on
    pub fn file(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        FinderError::FileError {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for FinderError {
    fn from(error: std::io::Error) -> Self {
        FinderError::FileError {
            path: PathBuf::new(),
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for FinderError {
    fn from(error: serde_json::Error) -> Self {
        FinderError::SerializationError(error.to_string())
    }
}

impl From<csv::Error> for FinderError {
    fn from(error: csv::Error) -> Self {
        FinderError::ParseError(format!("CSV: {}", error))
    }
}

impl From<reqwest::Error> for FinderError {
    fn from(error: reqwest::Error) -> Self {
        FinderError::NetworkError(error.to_string())
    }
}

impl From<config::ConfigError> for FinderError {
    fn from(error: config::ConfigError) -> Self {
        FinderError::ConfigError(error.to_string())
    }
}

impl From<toml::ser::Error> for FinderError {
    fn from(error: toml::ser::Error) -> Self {
        FinderError::SerializationError(error.to_string())
    }
}

impl From<anyhow::Error> for FinderError {
    fn from(error: anyhow::Error) -> Self {
        FinderError::UnexpectedError(error.to_string())
    }
}

pub type FinderResult<T> = std::result::Result<T, FinderError>;
