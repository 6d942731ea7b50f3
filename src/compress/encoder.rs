use super::{CompressedImage, CompressionLimits, CompressionService, WEBP_CONTENT_TYPE};
use crate::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// How many times the encoder will downscale and retry when the WebP output
/// is still over the byte ceiling. The ceiling is best-effort, so after the
/// last attempt the oversized result is returned as-is.
const MAX_SHRINK_ATTEMPTS: u32 = 4;

/// Each retry scales both edges by this factor.
const SHRINK_FACTOR: f32 = 0.7;

pub struct ImageCompressor;

impl ImageCompressor {
    pub fn new() -> Self {
        Self
    }

    fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        // The WebP encoder wants RGB8/RGBA8 input.
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        rgba.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)?;
        Ok(buf)
    }

    fn compress_sync(data: &[u8], limits: &CompressionLimits) -> Result<CompressedImage> {
        let mut img = image::load_from_memory(data)?;

        let max = limits.max_dimension_px;
        if img.width() > max || img.height() > max {
            img = img.resize(max, max, image::imageops::FilterType::Lanczos3);
        }

        let mut encoded = Self::encode_webp(&img)?;
        let mut attempt = 0;
        while encoded.len() as u64 > limits.max_size_bytes && attempt < MAX_SHRINK_ATTEMPTS {
            attempt += 1;
            let width = ((img.width() as f32 * SHRINK_FACTOR) as u32).max(1);
            let height = ((img.height() as f32 * SHRINK_FACTOR) as u32).max(1);
            img = img.resize(width, height, image::imageops::FilterType::Lanczos3);
            encoded = Self::encode_webp(&img)?;
        }

        if encoded.len() as u64 > limits.max_size_bytes {
            tracing::warn!(
                "Compressed image still {} bytes after {} attempts (ceiling {})",
                encoded.len(),
                MAX_SHRINK_ATTEMPTS,
                limits.max_size_bytes
            );
        }

        Ok(CompressedImage {
            data: encoded,
            content_type: WEBP_CONTENT_TYPE.to_string(),
            width: img.width(),
            height: img.height(),
        })
    }
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompressionService for ImageCompressor {
    async fn compress(&self, data: &[u8], limits: &CompressionLimits) -> Result<CompressedImage> {
        let data = data.to_vec();
        let limits = *limits;

        tokio::task::spawn_blocking(move || Self::compress_sync(&data, &limits))
            .await
            .map_err(|e| Error::Invariant(format!("Compression task join error: {}", e)))?
    }
}
