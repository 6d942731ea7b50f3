//! Data models and configuration
//!
//! Defines the file selection payload handed to the upload controllers,
//! the environment-driven configuration for the CLI, and the report the
//! CLI prints after a run.

use serde::{Deserialize, Serialize};

/// A user-selected file, as handed to an upload controller.
///
/// Controllers validate the `content_type` before any compression or
/// transfer happens; anything that does not look like an image is rejected.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Result of a CLI run, printed as JSON so scripts can consume the URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub urls: Vec<String>,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_access_key_id: String,
    pub store_secret_access_key: String,
    pub store_endpoint: String,
    pub store_bucket: String,
    pub store_base_url: String,
    pub owner_id: String,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            store_access_key_id: std::env::var("STORE_ACCESS_KEY_ID")
                .map_err(|_| crate::Error::Config("STORE_ACCESS_KEY_ID not set".to_string()))?,
            store_secret_access_key: std::env::var("STORE_SECRET_ACCESS_KEY")
                .map_err(|_| crate::Error::Config("STORE_SECRET_ACCESS_KEY not set".to_string()))?,
            store_endpoint: std::env::var("STORE_ENDPOINT")
                .unwrap_or_else(|_| "https://nyc3.digitaloceanspaces.com".to_string()),
            store_bucket: std::env::var("STORE_BUCKET")
                .unwrap_or_else(|_| "listing-uploads".to_string()),
            store_base_url: std::env::var("STORE_BASE_URL")
                .unwrap_or_else(|_| "https://cdn.listing-uploads.example".to_string()),
            owner_id: std::env::var("OWNER_ID").unwrap_or_else(|_| "cli".to_string()),
        })
    }
}
