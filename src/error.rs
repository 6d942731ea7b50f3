//! Error handling and custom error types
//!
//! Provides unified error handling across the upload pipeline using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not an image: {0}")]
    Validation(String),

    #[error("image compression failed: {0}")]
    Compression(#[from] image::ImageError),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("gallery is full ({max} images)")]
    Capacity { max: usize },

    #[error("image index {index} out of range (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
