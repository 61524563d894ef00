//! Error types for the shopchat library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Could not read image: {0}")]
    ImageDecode(String),

    #[error("Could not encode image: {0}")]
    ImageEncode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Image processing was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
