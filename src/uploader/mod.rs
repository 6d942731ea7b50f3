//! Upload controllers
//!
//! The stateful core of the pipeline: a single-image controller for cover
//! photo fields and a multi-image controller for photo galleries. Both
//! validate the selection, compress it, transfer it with progress, and hand
//! the resulting durable URLs back to the owning form via a completion
//! callback, reverting to the pre-operation state on any failure.

pub mod multi;
pub mod single;

pub use multi::{MultiImageUploader, DEFAULT_MAX_IMAGES};
pub use single::SingleImageUploader;

use crate::compress::WEBP_CONTENT_TYPE;
use crate::models::FileUpload;
use crate::store::{ObjectStore, TransferUpdate};
use crate::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;

/// Where a single-image field currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Empty,
    Compressing,
    Uploading,
    Complete,
}

/// Receives overall progress as a percentage in `[0, 100]`. Values are
/// strictly increasing within one operation; a new operation restarts at 0.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, percent: f32);
}

/// Invoked with the committed URL on success, or `""` on removal.
pub type SingleCompletion = Box<dyn Fn(&str) + Send + Sync>;

/// Invoked with the full ordered URL list after a committed batch or a
/// removal.
pub type BatchCompletion = Box<dyn Fn(&[String]) + Send + Sync>;

/// Length of the random suffix in storage keys. Unguessable enough within
/// one owner's namespace; no cryptographic guarantee intended.
const KEY_TOKEN_LEN: usize = 7;

/// Build a storage key: `{prefix}/{millis}_{token}.webp`.
pub(crate) fn storage_key(prefix: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}/{}_{}.webp", prefix, Utc::now().timestamp_millis(), token)
}

/// Inline preview for a freshly selected file, shown until the durable URL
/// replaces it. The Rust-side stand-in for `URL.createObjectURL`.
pub(crate) fn preview_data_url(file: &FileUpload) -> String {
    format!(
        "data:{};base64,{}",
        file.content_type,
        BASE64.encode(&file.data)
    )
}

/// Run one transfer, forwarding progress updates as they arrive.
///
/// All buffered updates are drained before the terminal result is returned,
/// so a caller always observes every progress event of a transfer before
/// its completion, and never sees two transfers interleave.
pub(crate) async fn drive_put(
    store: &dyn ObjectStore,
    key: &str,
    data: &[u8],
    mut on_progress: impl FnMut(TransferUpdate),
) -> Result<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let put = store.put(key, data, WEBP_CONTENT_TYPE, tx);
    tokio::pin!(put);

    let mut outcome = None;
    loop {
        tokio::select! {
            result = &mut put, if outcome.is_none() => outcome = Some(result),
            update = rx.recv() => match update {
                Some(update) => on_progress(update),
                None => break,
            },
        }
    }

    outcome.expect("transfer resolves before its progress channel closes")
}
