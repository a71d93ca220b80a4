// src/text_source.rs

use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::OcrSection;
use crate::error::{Result, ScanError};

/// Receipt text that has already been through OCR (or never needed it).
///
/// Behaves as plain text for every consumer purpose; the wrapper only
/// marks provenance so the pipeline need not re-detect input type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent(String);

impl TextContent {
    pub fn new(text: impl Into<String>) -> TextContent {
        TextContent(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for TextContent {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TextContent {
    fn from(text: String) -> TextContent {
        TextContent(text)
    }
}

/// Produces receipt text from raw input bytes (image/PDF/plain text).
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn load(&self, bytes: &[u8]) -> Result<TextContent>;
}

/// The OCR service boundary: recognize raw bytes, or an object previously
/// staged into storage the service can reach.
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn recognize(&self, bytes: &[u8]) -> Result<String>;

    async fn recognize_stored(&self, key: &str) -> Result<String>;
}

/// Object storage boundary used by the upload-based OCR path.
///
/// Implementations fail `put` with [`ScanError::StorageWriteFailed`] so the
/// caller can tell a staging failure from an OCR failure.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Passthrough source for input that is already text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainText;

#[async_trait]
impl TextSource for PlainText {
    async fn load(&self, bytes: &[u8]) -> Result<TextContent> {
        Ok(TextContent::new(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Sends input bytes straight to the OCR service.
pub struct DirectOcr {
    ocr: Arc<dyn OcrService>,
}

impl DirectOcr {
    pub fn new(ocr: Arc<dyn OcrService>) -> DirectOcr {
        DirectOcr { ocr }
    }
}

#[async_trait]
impl TextSource for DirectOcr {
    async fn load(&self, bytes: &[u8]) -> Result<TextContent> {
        let text = self.ocr.recognize(bytes).await?;
        info!(bytes = bytes.len(), chars = text.len(), "OCR complete");
        Ok(TextContent::new(text))
    }
}

/// Stages input bytes into object storage, then asks the OCR service to
/// read the stored object.
///
/// The staged object is released on every path, OCR success or failure;
/// a failed release is logged and never masks the OCR outcome.
pub struct OcrViaUpload {
    ocr: Arc<dyn OcrService>,
    storage: Arc<dyn ObjectStorage>,
}

impl OcrViaUpload {
    pub fn new(ocr: Arc<dyn OcrService>, storage: Arc<dyn ObjectStorage>) -> OcrViaUpload {
        OcrViaUpload { ocr, storage }
    }
}

#[async_trait]
impl TextSource for OcrViaUpload {
    async fn load(&self, bytes: &[u8]) -> Result<TextContent> {
        let key = staging_key(bytes);
        self.storage.put(&key, bytes).await?;
        info!(key = %key, bytes = bytes.len(), "Staged input for OCR");

        let recognized = self.ocr.recognize_stored(&key).await;

        if let Err(e) = self.storage.delete(&key).await {
            warn!(key = %key, error = %e, "Failed to release staged object");
        }

        Ok(TextContent::new(recognized?))
    }
}

/// Staging key derived from the content hash, so retries of the same
/// input land on the same object.
fn staging_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("staging/{digest:x}")
}

#[derive(Debug, Deserialize)]
struct OcrAnalyzeResponse {
    text: String,
}

/// Client for a remote OCR HTTP service.
pub struct RemoteOcr {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl RemoteOcr {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::OcrServiceFailed(e.to_string()))?;
        Ok(RemoteOcr {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(ocr: &OcrSection) -> Result<Self> {
        let api_key = std::env::var(&ocr.api_key_env)
            .map_err(|_| ScanError::OcrServiceFailed(format!("{} env var not set", ocr.api_key_env)))?;
        RemoteOcr::new(&ocr.endpoint, api_key, Duration::from_secs(ocr.timeout_secs))
    }

    async fn read_text(&self, response: reqwest::Response) -> Result<String> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::OcrServiceFailed(format!("{status}: {body}")));
        }
        let parsed: OcrAnalyzeResponse = response
            .json()
            .await
            .map_err(|e| ScanError::OcrServiceFailed(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl OcrService for RemoteOcr {
    async fn recognize(&self, bytes: &[u8]) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/analyze", self.endpoint))
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ScanError::OcrServiceFailed(e.to_string()))?;
        self.read_text(response).await
    }

    async fn recognize_stored(&self, key: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/analyze-stored", self.endpoint))
            .header("X-Api-Key", &self.api_key)
            .json(&serde_json::json!({ "key": key }))
            .send()
            .await
            .map_err(|e| ScanError::OcrServiceFailed(e.to_string()))?;
        self.read_text(response).await
    }
}

/// Filesystem-backed staging storage.
pub struct FsObjectStorage {
    dir: PathBuf,
}

impl FsObjectStorage {
    pub fn new(dir: impl Into<PathBuf>) -> FsObjectStorage {
        FsObjectStorage { dir: dir.into() }
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScanError::StorageWriteFailed(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ScanError::StorageWriteFailed(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        tokio::fs::remove_file(self.dir.join(key))
            .await
            .map_err(|e| ScanError::StorageWriteFailed(e.to_string()))
    }
}
