// Error types for configuration management

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse {file}: {reason}")]
    ParseError { file: String, reason: String },

    #[error("Invalid configuration key: '{0}'")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for snail_core::Error {
    fn from(err: ConfigError) -> Self {
        snail_core::Error::Config(err.to_string())
    }
}
