//! Byte transports used by the built-in loaders.
//!
//! The queue core only needs "start fetch, report progress, return bytes or
//! fail". Network transports are supplied by the embedding application.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::AsyncReadExt;

use super::error::TransportError;
use super::loader::ProgressReporter;
use crate::items::LoadItem;

/// Default read chunk for [`FileTransport`].
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Fetches the raw bytes behind a [`LoadItem`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Reads item sources as paths below a root directory.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
    chunk_size: usize,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_READ_CHUNK,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `src` below the root, rejecting anything that escapes it.
    pub async fn resolve(&self, src: &str) -> Result<PathBuf, TransportError> {
        if src.contains("://") {
            return Err(TransportError::Unavailable(format!(
                "file transport cannot fetch {src}"
            )));
        }
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| TransportError::NotFound(self.root.display().to_string()))?;
        let full_path = root.join(src.trim_start_matches('/'));
        let canonical = tokio::fs::canonicalize(&full_path)
            .await
            .map_err(|_| TransportError::NotFound(src.to_string()))?;

        if !canonical.starts_with(&root) {
            return Err(TransportError::PathNotAllowed(canonical));
        }
        Ok(canonical)
    }
}

#[async_trait::async_trait]
impl Transport for FileTransport {
    async fn fetch(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, TransportError> {
        let path = self.resolve(&item.src).await?;
        let mut file = tokio::fs::File::open(&path).await?;
        let total = file.metadata().await?.len();

        let mut bytes = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            progress.report_bytes(bytes.len() as u64, Some(total));
        }
        Ok(bytes)
    }
}

/// Serves byte blobs from memory, optionally with simulated latency.
#[derive(Default)]
pub struct MemoryTransport {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, src: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.files.write().insert(src.into(), bytes.into());
    }

    pub fn remove(&self, src: &str) -> bool {
        self.files.write().remove(src).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn fetch(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, TransportError> {
        if let Some(latency) = self.latency {
            // Two halves so listeners see intermediate progress.
            tokio::time::sleep(latency / 2).await;
            progress.report(0.5);
            tokio::time::sleep(latency / 2).await;
        }
        let bytes = self
            .files
            .read()
            .get(&item.src)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(item.src.clone()))?;
        progress.report(1.0);
        Ok(bytes.to_vec())
    }
}
