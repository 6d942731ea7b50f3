use super::{drive_put, storage_key, BatchCompletion, ProgressSink};
use crate::compress::{CompressionLimits, CompressionService};
use crate::models::FileUpload;
use crate::store::ObjectStore;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const DEFAULT_MAX_IMAGES: usize = 5;

/// Controller for an ordered, capacity-bounded photo gallery field.
///
/// A selection is processed as one batch, strictly sequentially: each file
/// is validated (non-images are skipped, not fatal), compressed, and
/// uploaded before the next one starts. The batch commits all-or-nothing:
/// a compression or transfer failure discards every URL the batch had
/// already produced and leaves the committed collection untouched. Batches
/// serialize on an internal operation lock; the capacity invariant
/// `count <= max_images` holds after every call.
pub struct MultiImageUploader {
    compressor: Arc<dyn CompressionService>,
    store: Arc<dyn ObjectStore>,
    limits: CompressionLimits,
    key_prefix: String,
    max_images: usize,
    on_complete: BatchCompletion,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    urls: Mutex<Vec<String>>,
    uploading: AtomicBool,
    progress: Mutex<f32>,
    op_lock: tokio::sync::Mutex<()>,
}

impl MultiImageUploader {
    pub fn new(
        compressor: Arc<dyn CompressionService>,
        store: Arc<dyn ObjectStore>,
        key_prefix: impl Into<String>,
        on_complete: BatchCompletion,
    ) -> Self {
        Self {
            compressor,
            store,
            limits: CompressionLimits::default(),
            key_prefix: key_prefix.into(),
            max_images: DEFAULT_MAX_IMAGES,
            on_complete,
            progress_sink: None,
            urls: Mutex::new(Vec::new()),
            uploading: AtomicBool::new(false),
            progress: Mutex::new(0.0),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self.clamp_to_capacity();
        self
    }

    /// Seed the gallery with already-committed URLs (edit flows). Set the
    /// capacity first when combining with `with_max_images`.
    pub fn with_existing_urls(self, urls: Vec<String>) -> Self {
        *self.urls.lock().unwrap() = urls;
        self.clamp_to_capacity();
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

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_images.saturating_sub(self.count())
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> f32 {
        *self.progress.lock().unwrap()
    }

    /// Upload a newly selected batch and, on success, append its URLs to
    /// the gallery. Files beyond the remaining capacity are silently
    /// ignored; a full gallery rejects the whole selection.
    pub async fn select_files(&self, files: Vec<FileUpload>) -> Result<()> {
        if files.is_empty() {
            tracing::debug!("Empty selection, nothing to do");
            return Ok(());
        }

        let _op = self.op_lock.lock().await;

        let remaining = self.remaining_slots();
        if remaining == 0 {
            return Err(Error::Capacity {
                max: self.max_images,
            });
        }

        let selected = files.len();
        let batch: Vec<FileUpload> = files.into_iter().take(remaining).collect();
        if batch.len() < selected {
            tracing::warn!(
                "Ignoring {} of {} selected files ({} slots left)",
                selected - batch.len(),
                selected,
                remaining
            );
        }

        let batch_id = Uuid::new_v4();
        tracing::info!(batch = %batch_id, "Uploading batch of {} files", batch.len());

        self.uploading.store(true, Ordering::SeqCst);
        self.reset_progress();

        let result = self.upload_batch(&batch, batch_id).await;
        self.uploading.store(false, Ordering::SeqCst);

        match result {
            Ok(uploaded) => {
                if !uploaded.is_empty() {
                    self.bump_progress(100.0);
                }
                let snapshot = {
                    let mut urls = self.urls.lock().unwrap();
                    urls.extend(uploaded);
                    urls.clone()
                };
                tracing::info!(
                    batch = %batch_id,
                    "Batch committed ({} images in gallery)",
                    snapshot.len()
                );
                (self.on_complete)(&snapshot);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(batch = %batch_id, "Batch failed, discarding partial uploads: {}", e);
                *self.progress.lock().unwrap() = 0.0;
                Err(e)
            }
        }
    }

    async fn upload_batch(&self, batch: &[FileUpload], batch_id: Uuid) -> Result<Vec<String>> {
        let n = batch.len();
        let mut uploaded = Vec::new();

        for (i, file) in batch.iter().enumerate() {
            if !file.is_image() {
                tracing::warn!(batch = %batch_id, "Skipping non-image file: {}", file.name);
                continue;
            }

            let compressed = self.compressor.compress(&file.data, &self.limits).await?;

            let key = storage_key(&self.key_prefix);
            tracing::info!(
                batch = %batch_id,
                "Uploading {} ({} bytes) to {}",
                file.name,
                compressed.data.len(),
                key
            );

            let url = drive_put(self.store.as_ref(), &key, &compressed.data, |update| {
                let overall = 100.0 * (i as f32 + update.fraction()) / n as f32;
                self.bump_progress(overall);
            })
            .await?;

            uploaded.push(url);
        }

        Ok(uploaded)
    }

    /// Remove one entry by index, preserving the order of the rest.
    /// Local-only: the stored object is not deleted remotely.
    pub fn remove_at(&self, index: usize) -> Result<()> {
        let snapshot = {
            let mut urls = self.urls.lock().unwrap();
            if index >= urls.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    count: urls.len(),
                });
            }
            urls.remove(index);
            urls.clone()
        };
        tracing::info!("Removed image {} ({} remain)", index, snapshot.len());
        (self.on_complete)(&snapshot);
        Ok(())
    }

    fn clamp_to_capacity(&self) {
        let mut urls = self.urls.lock().unwrap();
        if urls.len() > self.max_images {
            tracing::warn!(
                "Seeded with {} images, truncating to capacity {}",
                urls.len(),
                self.max_images
            );
            urls.truncate(self.max_images);
        }
    }

    fn emit(&self, percent: f32) {
        if let Some(sink) = &self.progress_sink {
            sink.on_progress(percent);
        }
    }

    fn reset_progress(&self) {
        *self.progress.lock().unwrap() = 0.0;
        self.emit(0.0);
    }

    /// Record and forward an aggregate progress value, dropping
    /// non-increasing updates.
    fn bump_progress(&self, percent: f32) {
        let advanced = {
            let mut progress = self.progress.lock().unwrap();
            if percent > *progress {
                *progress = percent;
                true
            } else {
                false
            }
        };
        if advanced {
            self.emit(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::MockCompressor;
    use crate::store::MockObjectStore;

    fn completion_probe() -> (BatchCompletion, Arc<Mutex<Vec<Vec<String>>>>) {
        let calls: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let probe = calls.clone();
        let callback: BatchCompletion =
            Box::new(move |urls: &[String]| probe.lock().unwrap().push(urls.to_vec()));
        (callback, calls)
    }

    fn image_file(name: &str, data: &[u8]) -> FileUpload {
        FileUpload::new(name, "image/jpeg", data.to_vec())
    }

    fn build_uploader(
        store: &MockObjectStore,
        on_complete: BatchCompletion,
    ) -> MultiImageUploader {
        MultiImageUploader::new(
            Arc::new(MockCompressor::new()),
            Arc::new(store.clone()),
            "units/unit-9",
            on_complete,
        )
    }

    #[tokio::test]
    async fn test_batch_commits_in_selection_order() {
        let store = MockObjectStore::new();
        let (callback, calls) = completion_probe();
        let uploader = build_uploader(&store, callback);

        uploader
            .select_files(vec![image_file("a.jpg", b"a"), image_file("b.jpg", b"b")])
            .await
            .unwrap();

        let urls = uploader.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with(&store.key_of(b"a").unwrap()));
        assert!(urls[1].ends_with(&store.key_of(b"b").unwrap()));
        assert_eq!(calls.lock().unwrap().as_slice(), &[urls]);
    }

    #[tokio::test]
    async fn test_full_gallery_rejects_selection() {
        let store = MockObjectStore::new();
        let (callback, calls) = completion_probe();
        let uploader = build_uploader(&store, callback)
            .with_max_images(2)
            .with_existing_urls(vec!["u1".to_string(), "u2".to_string()]);

        let result = uploader.select_files(vec![image_file("c.jpg", b"c")]).await;

        assert!(matches!(result, Err(Error::Capacity { max: 2 })));
        assert_eq!(uploader.count(), 2);
        assert_eq!(store.get_put_count(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_image_is_skipped_not_fatal() {
        let store = MockObjectStore::new();
        let compressor = MockCompressor::new();
        let (callback, _calls) = completion_probe();
        let uploader = MultiImageUploader::new(
            Arc::new(compressor.clone()),
            Arc::new(store.clone()),
            "units/unit-9",
            callback,
        );

        uploader
            .select_files(vec![
                image_file("a.jpg", b"a"),
                FileUpload::new("list.pdf", "application/pdf", b"pdf".to_vec()),
                image_file("b.jpg", b"b"),
            ])
            .await
            .unwrap();

        assert_eq!(uploader.count(), 2);
        assert_eq!(compressor.get_call_count(), 2);
        assert_eq!(store.get_put_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_at_preserves_order_and_bounds() {
        let store = MockObjectStore::new();
        let (callback, calls) = completion_probe();
        let uploader = build_uploader(&store, callback).with_existing_urls(vec![
            "u1".to_string(),
            "u2".to_string(),
            "u3".to_string(),
        ]);

        uploader.remove_at(1).unwrap();
        assert_eq!(uploader.urls(), vec!["u1".to_string(), "u3".to_string()]);

        let result = uploader.remove_at(2);
        assert!(matches!(
            result,
            Err(Error::IndexOutOfBounds { index: 2, count: 2 })
        ));
        assert_eq!(uploader.count(), 2);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection_is_a_no_op() {
        let store = MockObjectStore::new();
        let (callback, calls) = completion_probe();
        let uploader = build_uploader(&store, callback);

        uploader.select_files(Vec::new()).await.unwrap();

        assert_eq!(uploader.count(), 0);
        assert_eq!(store.get_put_count(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }
}
