use listing_uploader::compress::MockCompressor;
use listing_uploader::models::FileUpload;
use listing_uploader::store::MockObjectStore;
use listing_uploader::uploader::{
    MultiImageUploader, ProgressSink, SingleImageUploader, UploadPhase,
};
use listing_uploader::Error;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY_PREFIX: &str = "uploads/owner-1";

struct RecordingSink {
    values: Mutex<Vec<f32>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(Vec::new()),
        })
    }

    fn values(&self) -> Vec<f32> {
        self.values.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, percent: f32) {
        self.values.lock().unwrap().push(percent);
    }
}

fn image_file(name: &str, data: &[u8]) -> FileUpload {
    FileUpload::new(name, "image/jpeg", data.to_vec())
}

fn single_probe() -> (Box<dyn Fn(&str) + Send + Sync>, Arc<Mutex<Vec<String>>>) {
    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let probe = calls.clone();
    (
        Box::new(move |url: &str| probe.lock().unwrap().push(url.to_string())),
        calls,
    )
}

fn batch_probe() -> (
    Box<dyn Fn(&[String]) + Send + Sync>,
    Arc<Mutex<Vec<Vec<String>>>>,
) {
    let calls: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let probe = calls.clone();
    (
        Box::new(move |urls: &[String]| probe.lock().unwrap().push(urls.to_vec())),
        calls,
    )
}

fn build_gallery(store: &MockObjectStore, max_images: usize) -> MultiImageUploader {
    let (callback, _) = batch_probe();
    MultiImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_max_images(max_images)
}

// Scenario: empty five-slot gallery, three files, all succeed.
#[tokio::test]
async fn test_batch_of_three_fills_three_slots_in_order() {
    let store = MockObjectStore::new();
    let gallery = build_gallery(&store, 5);

    gallery
        .select_files(vec![
            image_file("a.jpg", b"photo-a"),
            image_file("b.jpg", b"photo-b"),
            image_file("c.jpg", b"photo-c"),
        ])
        .await
        .unwrap();

    let urls = gallery.urls();
    assert_eq!(gallery.count(), 3);
    assert!(urls[0].ends_with(&store.key_of(b"photo-a").unwrap()));
    assert!(urls[1].ends_with(&store.key_of(b"photo-b").unwrap()));
    assert!(urls[2].ends_with(&store.key_of(b"photo-c").unwrap()));
}

// Scenario: three more files when only two slots remain. The overflow is
// ignored, not an error.
#[tokio::test]
async fn test_selection_truncates_to_remaining_slots() {
    let store = MockObjectStore::new();
    let gallery = build_gallery(&store, 5);

    gallery
        .select_files(vec![
            image_file("a.jpg", b"photo-a"),
            image_file("b.jpg", b"photo-b"),
            image_file("c.jpg", b"photo-c"),
        ])
        .await
        .unwrap();

    gallery
        .select_files(vec![
            image_file("d.jpg", b"photo-d"),
            image_file("e.jpg", b"photo-e"),
            image_file("f.jpg", b"photo-f"),
        ])
        .await
        .unwrap();

    let urls = gallery.urls();
    assert_eq!(gallery.count(), 5);
    assert_eq!(gallery.remaining_slots(), 0);
    assert_eq!(store.get_put_count(), 5);
    assert!(urls[3].ends_with(&store.key_of(b"photo-d").unwrap()));
    assert!(urls[4].ends_with(&store.key_of(b"photo-e").unwrap()));
    assert_eq!(store.key_of(b"photo-f"), None);
}

// Scenario: a failed replacement upload leaves the previously committed
// cover photo in place and never notifies the form.
#[tokio::test]
async fn test_failed_single_upload_keeps_prior_url() {
    let store = MockObjectStore::new().with_put_outcome(false);
    let (callback, calls) = single_probe();
    let uploader = SingleImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_existing_url("old.webp");

    let result = uploader.select_file(image_file("new.jpg", b"new bytes")).await;

    assert!(matches!(result, Err(Error::Transfer(_))));
    assert_eq!(uploader.url(), Some("old.webp".to_string()));
    assert_eq!(uploader.preview(), Some("old.webp".to_string()));
    assert_eq!(uploader.phase(), UploadPhase::Complete);
    assert!(calls.lock().unwrap().is_empty());
}

// Scenario: item two of three dies mid-transfer. The whole batch is
// discarded and the gallery is untouched.
#[tokio::test]
async fn test_mid_batch_transfer_failure_discards_whole_batch() {
    let store = MockObjectStore::new()
        .with_put_outcome(true)
        .with_put_outcome(false)
        .with_put_outcome(true);
    let (callback, calls) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    );

    let result = gallery
        .select_files(vec![
            image_file("a.jpg", b"photo-a"),
            image_file("b.jpg", b"photo-b"),
            image_file("c.jpg", b"photo-c"),
        ])
        .await;

    assert!(matches!(result, Err(Error::Transfer(_))));
    assert_eq!(gallery.count(), 0);
    assert_eq!(gallery.urls(), Vec::<String>::new());
    assert_eq!(gallery.progress(), 0.0);
    assert_eq!(store.get_put_count(), 2);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_mid_batch_failure_preserves_preexisting_entries() {
    let store = MockObjectStore::new()
        .with_put_outcome(true)
        .with_put_outcome(false);
    let (callback, calls) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_existing_urls(vec!["seed-1.webp".to_string(), "seed-2.webp".to_string()]);

    let result = gallery
        .select_files(vec![
            image_file("a.jpg", b"photo-a"),
            image_file("b.jpg", b"photo-b"),
        ])
        .await;

    assert!(matches!(result, Err(Error::Transfer(_))));
    assert_eq!(
        gallery.urls(),
        vec!["seed-1.webp".to_string(), "seed-2.webp".to_string()]
    );
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_single_progress_is_monotonic_with_one_terminal_100() {
    let store = MockObjectStore::new().with_chunks(4);
    let sink = RecordingSink::new();
    let (callback, _) = single_probe();
    let uploader = SingleImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_progress_sink(sink.clone());

    uploader
        .select_file(image_file("a.jpg", &[0u8; 100]))
        .await
        .unwrap();

    let values = sink.values();
    assert_eq!(values, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    assert_eq!(values.iter().filter(|v| **v == 100.0).count(), 1);
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_batch_aggregate_progress_reaches_100_on_last_item() {
    let store = MockObjectStore::new().with_chunks(2);
    let sink = RecordingSink::new();
    let (callback, _) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_progress_sink(sink.clone());

    gallery
        .select_files(vec![
            image_file("a.jpg", &[1u8; 100]),
            image_file("b.jpg", &[2u8; 100]),
        ])
        .await
        .unwrap();

    let values = sink.values();
    assert_eq!(values, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    assert_eq!(gallery.progress(), 100.0);
    assert_eq!(gallery.count(), 2);
}

// Selecting a replacement while an upload is in flight supersedes it: the
// stale operation's result is discarded and the form hears exactly once.
#[tokio::test]
async fn test_new_selection_supersedes_in_flight_upload() {
    let store = MockObjectStore::new().with_chunk_delay(Duration::from_millis(30));
    let (callback, calls) = single_probe();
    let uploader = Arc::new(SingleImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    ));

    let first = {
        let uploader = uploader.clone();
        tokio::spawn(async move { uploader.select_file(image_file("a.jpg", b"first")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    uploader
        .select_file(image_file("b.jpg", b"second"))
        .await
        .unwrap();

    // The superseded operation resolves quietly, without an error.
    first.await.unwrap().unwrap();

    let winning_key = store.key_of(b"second").unwrap();
    assert!(uploader.url().unwrap().ends_with(&winning_key));
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(uploader.phase(), UploadPhase::Complete);
}

#[tokio::test]
async fn test_capacity_invariant_holds_across_call_sequence() {
    let store = MockObjectStore::new();
    let gallery = build_gallery(&store, 3);

    let within_bounds = |g: &MultiImageUploader| g.count() <= g.max_images();

    gallery
        .select_files(vec![
            image_file("a.jpg", b"a"),
            image_file("b.jpg", b"b"),
        ])
        .await
        .unwrap();
    assert!(within_bounds(&gallery));

    gallery
        .select_files(vec![
            image_file("c.jpg", b"c"),
            image_file("d.jpg", b"d"),
        ])
        .await
        .unwrap();
    assert!(within_bounds(&gallery));
    assert_eq!(gallery.count(), 3);

    gallery.remove_at(0).unwrap();
    assert!(within_bounds(&gallery));

    gallery
        .select_files(vec![image_file("e.jpg", b"e")])
        .await
        .unwrap();
    assert!(within_bounds(&gallery));
    assert_eq!(gallery.count(), 3);

    let result = gallery.select_files(vec![image_file("f.jpg", b"f")]).await;
    assert!(matches!(result, Err(Error::Capacity { max: 3 })));
    assert!(within_bounds(&gallery));
    assert_eq!(gallery.count(), 3);
}

// A second removal at an index the first removal invalidated is a bounds
// error, not a double-removal.
#[tokio::test]
async fn test_remove_at_is_not_replayable() {
    let store = MockObjectStore::new();
    let (callback, calls) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(MockCompressor::new()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    )
    .with_existing_urls(vec![
        "u1.webp".to_string(),
        "u2.webp".to_string(),
        "u3.webp".to_string(),
    ]);

    gallery.remove_at(2).unwrap();
    assert_eq!(gallery.count(), 2);

    let result = gallery.remove_at(2);
    assert!(matches!(
        result,
        Err(Error::IndexOutOfBounds { index: 2, count: 2 })
    ));
    assert_eq!(
        gallery.urls(),
        vec!["u1.webp".to_string(), "u2.webp".to_string()]
    );
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_image_selection_touches_no_collaborator() {
    let compressor = MockCompressor::new();
    let store = MockObjectStore::new();
    let (callback, _) = single_probe();
    let uploader = SingleImageUploader::new(
        Arc::new(compressor.clone()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    );

    let result = uploader
        .select_file(FileUpload::new("lease.pdf", "application/pdf", vec![1, 2]))
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(compressor.get_call_count(), 0);
    assert_eq!(store.get_put_count(), 0);
}

#[tokio::test]
async fn test_batch_of_only_non_images_uploads_nothing() {
    let compressor = MockCompressor::new();
    let store = MockObjectStore::new();
    let (callback, _) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(compressor.clone()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    );

    gallery
        .select_files(vec![
            FileUpload::new("a.pdf", "application/pdf", vec![1]),
            FileUpload::new("b.txt", "text/plain", vec![2]),
        ])
        .await
        .unwrap();

    assert_eq!(gallery.count(), 0);
    assert_eq!(compressor.get_call_count(), 0);
    assert_eq!(store.get_put_count(), 0);
}

#[tokio::test]
async fn test_mid_batch_compression_failure_aborts_batch() {
    let store = MockObjectStore::new();
    let compressor = MockCompressor::new().with_outcome(true).with_outcome(false);
    let (callback, calls) = batch_probe();
    let gallery = MultiImageUploader::new(
        Arc::new(compressor.clone()),
        Arc::new(store.clone()),
        KEY_PREFIX,
        callback,
    );

    let result = gallery
        .select_files(vec![
            image_file("a.jpg", b"photo-a"),
            image_file("b.jpg", b"photo-b"),
        ])
        .await;

    assert!(matches!(result, Err(Error::Compression(_))));
    assert_eq!(gallery.count(), 0);
    assert_eq!(store.get_put_count(), 1);
    assert!(calls.lock().unwrap().is_empty());
}
