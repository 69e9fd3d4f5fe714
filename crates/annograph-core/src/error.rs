use thiserror::Error;

/// Top-level error type for annograph configuration and shared plumbing.
#[derive(Error, Debug)]
pub enum AnnographError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AnnographError>;
