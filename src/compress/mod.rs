//! Image compression service
//!
//! Re-encodes user-selected images to web-optimized WebP within size and
//! dimension ceilings before they are transferred to the object store.

pub mod encoder;
pub mod mock;

pub use encoder::ImageCompressor;
pub use mock::MockCompressor;

use crate::Result;
use async_trait::async_trait;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";

/// Ceilings applied during re-encoding.
///
/// The byte ceiling is best-effort; the dimension ceiling is hard, the
/// longer edge of the output never exceeds it.
#[derive(Debug, Clone, Copy)]
pub struct CompressionLimits {
    pub max_size_bytes: u64,
    pub max_dimension_px: u32,
}

impl Default for CompressionLimits {
    fn default() -> Self {
        Self {
            max_size_bytes: 1024 * 1024,
            max_dimension_px: 1024,
        }
    }
}

/// A re-encoded image, ready for upload. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait CompressionService: Send + Sync {
    async fn compress(&self, data: &[u8], limits: &CompressionLimits) -> Result<CompressedImage>;
}
