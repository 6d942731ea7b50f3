use super::{
    drive_put, preview_data_url, storage_key, ProgressSink, SingleCompletion, UploadPhase,
};
use crate::compress::{CompressionLimits, CompressionService};
use crate::models::FileUpload;
use crate::store::ObjectStore;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Controller for a one-image form field (a building's cover photo).
///
/// Selecting a file runs the whole pipeline: validate, preview, compress,
/// upload with progress, commit. A failure at any point restores the field
/// to exactly its pre-selection state. Selecting again while an operation
/// is in flight supersedes it: each operation carries a generation number
/// taken at selection time, and a terminal result whose generation is no
/// longer current is discarded without touching state.
pub struct SingleImageUploader {
    compressor: Arc<dyn CompressionService>,
    store: Arc<dyn ObjectStore>,
    limits: CompressionLimits,
    key_prefix: String,
    on_complete: SingleCompletion,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    generation: AtomicU64,
    state: Mutex<FieldState>,
}

struct FieldState {
    url: Option<String>,
    preview: Option<String>,
    phase: UploadPhase,
    progress: f32,
}

impl SingleImageUploader {
    pub fn new(
        compressor: Arc<dyn CompressionService>,
        store: Arc<dyn ObjectStore>,
        key_prefix: impl Into<String>,
        on_complete: SingleCompletion,
    ) -> Self {
        Self {
            compressor,
            store,
            limits: CompressionLimits::default(),
            key_prefix: key_prefix.into(),
            on_complete,
            progress_sink: None,
            generation: AtomicU64::new(0),
            state: Mutex::new(FieldState {
                url: None,
                preview: None,
                phase: UploadPhase::Empty,
                progress: 0.0,
            }),
        }
    }

    /// Seed the field with an already-committed URL (edit flows).
    pub fn with_existing_url(self, url: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let url = url.into();
            state.preview = Some(url.clone());
            state.url = Some(url);
            state.phase = UploadPhase::Complete;
        }
        self
    }

    pub fn with_limits(mut self, limits: CompressionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// The committed durable URL, if any. Unchanged while an operation is in
    /// flight; only a successful commit or `remove` moves it.
    pub fn url(&self) -> Option<String> {
        self.state.lock().unwrap().url.clone()
    }

    /// What the field currently displays: a local preview during an
    /// operation, the durable URL after a commit.
    pub fn preview(&self) -> Option<String> {
        self.state.lock().unwrap().preview.clone()
    }

    pub fn phase(&self) -> UploadPhase {
        self.state.lock().unwrap().phase
    }

    pub fn progress(&self) -> f32 {
        self.state.lock().unwrap().progress
    }

    pub fn is_uploading(&self) -> bool {
        matches!(
            self.phase(),
            UploadPhase::Compressing | UploadPhase::Uploading
        )
    }

    /// Run the pipeline for one selected file.
    pub async fn select_file(&self, file: FileUpload) -> Result<()> {
        if !file.is_image() {
            return Err(Error::Validation(format!(
                "{} ({})",
                file.name, file.content_type
            )));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Selected {} ({} bytes)", file.name, file.size_bytes());

        let prior_url = {
            let mut state = self.state.lock().unwrap();
            let prior = state.url.clone();
            state.preview = Some(preview_data_url(&file));
            state.phase = UploadPhase::Compressing;
            state.progress = 0.0;
            prior
        };
        self.emit(0.0);

        let compressed = match self.compressor.compress(&file.data, &self.limits).await {
            Ok(compressed) => compressed,
            Err(e) => return self.fail(generation, prior_url, e),
        };

        if !self.is_current(generation) {
            tracing::debug!("Discarding superseded compression of {}", file.name);
            return Ok(());
        }
        self.state.lock().unwrap().phase = UploadPhase::Uploading;

        let key = storage_key(&self.key_prefix);
        tracing::info!("Uploading {} bytes to {}", compressed.data.len(), key);

        let result = drive_put(self.store.as_ref(), &key, &compressed.data, |update| {
            self.bump_progress(generation, update.fraction() * 100.0);
        })
        .await;

        match result {
            Ok(url) => {
                if !self.is_current(generation) {
                    tracing::debug!("Discarding superseded upload of {}", key);
                    return Ok(());
                }
                {
                    let mut state = self.state.lock().unwrap();
                    state.url = Some(url.clone());
                    state.preview = Some(url.clone());
                    state.phase = UploadPhase::Complete;
                }
                self.bump_progress(generation, 100.0);
                tracing::info!("Upload complete: {}", url);
                (self.on_complete)(&url);
                Ok(())
            }
            Err(e) => self.fail(generation, prior_url, e),
        }
    }

    /// Clear the field. Local-only: the stored object, if any, is not
    /// deleted remotely. Supersedes any in-flight operation.
    pub fn remove(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock().unwrap();
            state.url = None;
            state.preview = None;
            state.phase = UploadPhase::Empty;
            state.progress = 0.0;
        }
        tracing::info!("Cleared image field");
        (self.on_complete)("");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn emit(&self, percent: f32) {
        if let Some(sink) = &self.progress_sink {
            sink.on_progress(percent);
        }
    }

    /// Record and forward a progress value, dropping stale-generation and
    /// non-increasing updates.
    fn bump_progress(&self, generation: u64, percent: f32) {
        if !self.is_current(generation) {
            return;
        }
        let advanced = {
            let mut state = self.state.lock().unwrap();
            if percent > state.progress {
                state.progress = percent;
                true
            } else {
                false
            }
        };
        if advanced {
            self.emit(percent);
        }
    }

    fn fail(&self, generation: u64, prior_url: Option<String>, error: Error) -> Result<()> {
        if !self.is_current(generation) {
            tracing::debug!("Discarding superseded failure: {}", error);
            return Ok(());
        }
        tracing::warn!("Upload failed, reverting field: {}", error);
        {
            let mut state = self.state.lock().unwrap();
            state.phase = if prior_url.is_some() {
                UploadPhase::Complete
            } else {
                UploadPhase::Empty
            };
            state.preview = prior_url;
            state.progress = 0.0;
        }
        Err(error)
    }
}
