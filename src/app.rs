//! Application orchestration for the upload CLI.

use crate::compress::{CompressionService, ImageCompressor};
use crate::models::{Config, FileUpload, UploadReport};
use crate::store::{ObjectStore, S3ObjectStore};
use crate::uploader::{MultiImageUploader, ProgressSink, SingleImageUploader};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::{info, warn};

/// Coordinates compression, object storage, and URL verification for one
/// CLI invocation.
pub struct App {
    compressor: Arc<dyn CompressionService>,
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    key_prefix: String,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub compressor: Arc<dyn CompressionService>,
    pub store: Arc<dyn ObjectStore>,
    pub http: reqwest::Client,
}

/// One upload job, as assembled from the CLI arguments.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub field: UploadField,
    pub verify: bool,
    pub retries: usize,
}

#[derive(Debug, Clone)]
pub enum UploadField {
    Cover {
        file: PathBuf,
        existing_url: Option<String>,
    },
    Gallery {
        files: Vec<PathBuf>,
        existing: Vec<String>,
        max_images: usize,
    },
}

/// Progress sink that traces percent milestones, so a CLI run shows the
/// same progress line the dashboard renders as a bar.
pub struct TraceProgress;

impl ProgressSink for TraceProgress {
    fn on_progress(&self, percent: f32) {
        info!("Upload progress: {:.0}%", percent);
    }
}

/// Sniff a selected file's content type from magic bytes. Anything
/// unrecognized stays `application/octet-stream` and is rejected by the
/// controllers' image validation.
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0x47, 0x49, 0x46, 0x38, ..] => "image/gif",
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses
    /// that need to inject mocks.
    pub fn with_services(services: AppServices, key_prefix: impl Into<String>) -> Self {
        Self {
            compressor: services.compressor,
            store: services.store,
            http: services.http,
            key_prefix: key_prefix.into(),
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;

        let store = S3ObjectStore::new(
            config.store_access_key_id.clone(),
            config.store_secret_access_key.clone(),
            config.store_endpoint.clone(),
            config.store_bucket.clone(),
            config.store_base_url.clone(),
        )
        .await?;

        Ok(Self::with_services(
            AppServices {
                compressor: Arc::new(ImageCompressor::new()),
                store: Arc::new(store),
                http: reqwest::Client::new(),
            },
            format!("uploads/{}", config.owner_id),
        ))
    }

    /// Run one upload job, retrying whole failed selections on request.
    /// Retrying is safe because a failed operation fully reverts the field.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadReport> {
        let retry_strategy = FixedInterval::from_millis(2000).take(request.retries);

        let report = Retry::spawn(retry_strategy, || async {
            match self.upload_once(&request.field).await {
                Ok(report) => Ok(report),
                Err(e) => {
                    warn!("Upload attempt failed: {}", e);
                    Err(e)
                }
            }
        })
        .await?;

        if request.verify {
            self.verify_urls(&report.urls).await?;
        }

        Ok(report)
    }

    async fn upload_once(&self, field: &UploadField) -> Result<UploadReport> {
        match field {
            UploadField::Cover { file, existing_url } => {
                let upload = Self::load_file(file)?;

                let committed: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
                let probe = committed.clone();
                let mut uploader = SingleImageUploader::new(
                    self.compressor.clone(),
                    self.store.clone(),
                    &self.key_prefix,
                    Box::new(move |url: &str| {
                        *probe.lock().unwrap() = Some(url.to_string());
                    }),
                )
                .with_progress_sink(Arc::new(TraceProgress));
                if let Some(url) = existing_url {
                    uploader = uploader.with_existing_url(url.clone());
                }

                uploader.select_file(upload).await?;

                let url = committed.lock().unwrap().clone().ok_or_else(|| {
                    Error::Invariant("completion callback not invoked".to_string())
                })?;
                Ok(UploadReport { urls: vec![url] })
            }
            UploadField::Gallery {
                files,
                existing,
                max_images,
            } => {
                let uploads = files
                    .iter()
                    .map(|path| Self::load_file(path))
                    .collect::<Result<Vec<_>>>()?;

                let committed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(existing.clone()));
                let probe = committed.clone();
                let uploader = MultiImageUploader::new(
                    self.compressor.clone(),
                    self.store.clone(),
                    &self.key_prefix,
                    Box::new(move |urls: &[String]| {
                        *probe.lock().unwrap() = urls.to_vec();
                    }),
                )
                .with_max_images(*max_images)
                .with_existing_urls(existing.clone())
                .with_progress_sink(Arc::new(TraceProgress));

                uploader.select_files(uploads).await?;

                let urls = committed.lock().unwrap().clone();
                Ok(UploadReport { urls })
            }
        }
    }

    fn load_file(path: &Path) -> Result<FileUpload> {
        let data = std::fs::read(path)?;
        let content_type = detect_content_type(&data);
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        info!("Read {} ({} bytes, {})", name, data.len(), content_type);
        Ok(FileUpload::new(name, content_type, data))
    }

    /// HEAD each committed URL to confirm the durable address actually
    /// resolves, the CLI's stand-in for the dashboard's post-upload URL
    /// fetch.
    async fn verify_urls(&self, urls: &[String]) -> Result<()> {
        for url in urls {
            let response = self.http.head(url).send().await?;
            if !response.status().is_success() {
                return Err(Error::Transfer(format!(
                    "uploaded object not reachable: {} ({})",
                    url,
                    response.status()
                )));
            }
            info!("Verified {}", url);
        }
        Ok(())
    }
}
