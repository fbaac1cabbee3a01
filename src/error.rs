use std::io;
use thiserror::Error;

use crate::core::browser::DriverError;

/// Custom error type for drivecrawl
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for drivecrawl
pub type Result<T> = std::result::Result<T, CrawlError>;

impl CrawlError {
    /// Create an invalid URL error
    pub fn invalid_url<S: Into<String>>(msg: S) -> Self {
        CrawlError::InvalidUrl(msg.into())
    }
}

impl From<url::ParseError> for CrawlError {
    fn from(err: url::ParseError) -> Self {
        CrawlError::InvalidUrl(err.to_string())
    }
}
