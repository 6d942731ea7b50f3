//! Binary object store integration
//!
//! Uploads compressed images to S3-compatible storage (DigitalOcean Spaces)
//! and exposes transfer progress as a stream of byte counts alongside the
//! terminal result.

pub mod client;
pub mod mock;

pub use client::S3ObjectStore;
pub use mock::MockObjectStore;

use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Incremental byte counts for one transfer. Non-decreasing per transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferUpdate {
    pub transferred: u64,
    pub total: u64,
}

impl TransferUpdate {
    /// Completed fraction in `[0, 1]`. Empty payloads count as done.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.transferred as f32 / self.total as f32
        }
    }
}

/// Progress side-channel for [`ObjectStore::put`]. Implementations send zero
/// or more updates before the returned future resolves; send failures are
/// ignored (the receiver may have stopped listening).
pub type ProgressSender = mpsc::UnboundedSender<TransferUpdate>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and resolve to its durable public URL.
    ///
    /// `key` must be unique within the store's namespace; collision
    /// avoidance is the caller's responsibility.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        progress: ProgressSender,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_of_partial_transfer() {
        let update = TransferUpdate {
            transferred: 25,
            total: 100,
        };
        assert_eq!(update.fraction(), 0.25);
    }

    #[test]
    fn test_fraction_of_empty_payload_is_complete() {
        let update = TransferUpdate {
            transferred: 0,
            total: 0,
        };
        assert_eq!(update.fraction(), 1.0);
    }
}
