use super::{CompressedImage, CompressionLimits, CompressionService, WEBP_CONTENT_TYPE};
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Pass-through compressor for tests: returns the input bytes relabelled as
/// WebP. Outcomes can be scripted per call to exercise failure paths.
#[derive(Clone)]
pub struct MockCompressor {
    call_count: Arc<Mutex<usize>>,
    outcomes: Arc<Mutex<Vec<bool>>>,
    fixed_output: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MockCompressor {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(Mutex::new(0)),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            fixed_output: Arc::new(Mutex::new(None)),
        }
    }

    /// Script the outcome of the next calls; consumed in order, wrapping
    /// around when exhausted.
    pub fn with_outcome(self, success: bool) -> Self {
        self.outcomes.lock().unwrap().push(success);
        self
    }

    /// Make every call return these exact bytes instead of echoing input.
    pub fn with_fixed_output(self, data: Vec<u8>) -> Self {
        *self.fixed_output.lock().unwrap() = Some(data);
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompressionService for MockCompressor {
    async fn compress(&self, data: &[u8], limits: &CompressionLimits) -> Result<CompressedImage> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        let call = *count;
        drop(count);

        let success = {
            let outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                true
            } else {
                outcomes[(call - 1) % outcomes.len()]
            }
        };

        if !success {
            return Err(crate::Error::Compression(image::ImageError::IoError(
                std::io::Error::other("Mock compression failure"),
            )));
        }

        let output = self
            .fixed_output
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| data.to_vec());

        Ok(CompressedImage {
            data: output,
            content_type: WEBP_CONTENT_TYPE.to_string(),
            width: limits.max_dimension_px,
            height: limits.max_dimension_px,
        })
    }
}
