use super::{ObjectStore, ProgressSender, TransferUpdate};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct MockObjectStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    base_url: String,
    put_count: Arc<Mutex<usize>>,
    outcomes: Arc<Mutex<Vec<bool>>>,
    chunk_count: usize,
    chunk_delay: Option<Duration>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-store.example.com".to_string(),
            put_count: Arc::new(Mutex::new(0)),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            chunk_count: 4,
            chunk_delay: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Script the outcome of the next puts; consumed in order, wrapping
    /// around when exhausted. A failing put emits one partial progress
    /// update before erroring, mimicking a transfer dying mid-flight.
    pub fn with_put_outcome(self, success: bool) -> Self {
        self.outcomes.lock().unwrap().push(success);
        self
    }

    /// Number of progress updates emitted per successful put.
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunk_count = chunks.max(1);
        self
    }

    /// Sleep between progress updates, for tests that interleave operations.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    /// Key under which `data` was stored, if any.
    pub fn key_of(&self, data: &[u8]) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(_, stored)| stored.as_slice() == data)
            .map(|(key, _)| key.clone())
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
        progress: ProgressSender,
    ) -> Result<String> {
        let call = {
            let mut count = self.put_count.lock().unwrap();
            *count += 1;
            *count
        };

        let success = {
            let outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                true
            } else {
                outcomes[(call - 1) % outcomes.len()]
            }
        };

        let total = data.len() as u64;
        let chunks = self.chunk_count as u64;

        if !success {
            let _ = progress.send(TransferUpdate {
                transferred: total / chunks.max(1),
                total,
            });
            return Err(crate::Error::Transfer(format!(
                "Mock transfer failure for {}",
                key
            )));
        }

        for i in 1..=chunks {
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }
            let _ = progress.send(TransferUpdate {
                transferred: total * i / chunks,
                total,
            });
        }

        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(format!("{}/{}", self.base_url, key))
    }
}
