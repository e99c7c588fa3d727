use loadcollect_common::{CollectError, Result};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::Span;

/// Payload client configuration
#[derive(Debug, Clone)]
pub struct PayloadConfig {
    /// Upper bound on the whole download, connect included.
    pub timeout: Duration,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10) }
    }
}

/// Downloads request payloads referenced by URL in a collect task.
pub struct PayloadClient {
    pub config: PayloadConfig,
    http_client: reqwest::Client,
    span: Span,
}

impl PayloadClient {
    /// Create a new client; events are recorded under `span`.
    pub fn new(config: PayloadConfig, span: Span) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectError::Payload(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, http_client, span })
    }

    /// Fetch the document at `url`. Any status of 400 or above is an error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CollectError::Payload(format!("cannot fetch {url}: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(CollectError::Payload(format!("fetching {url} returned HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollectError::Payload(format!("cannot read body of {url}: {e}")))?;

        tracing::debug!(parent: &self.span, url, bytes = bytes.len(), "Fetched payload");
        Ok(bytes.to_vec())
    }

    /// Fetch `url` once and stage it in a local temp file that every load-generator
    /// run of the same collection can read.
    pub async fn stage(&self, url: &str) -> Result<StagedPayload> {
        let bytes = self.fetch(url).await?;
        let staged = StagedPayload::from_bytes(&bytes)?;
        tracing::debug!(parent: &self.span, url, path = %staged.path().display(), "Staged payload");
        Ok(staged)
    }
}

/// A payload written to a temp file. The file is removed when this value drops.
#[derive(Debug)]
pub struct StagedPayload {
    file: NamedTempFile,
}

impl StagedPayload {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("payload.")
            .suffix(".json")
            .tempfile()
            .map_err(|e| CollectError::Payload(format!("cannot create payload file: {e}")))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| CollectError::Payload(format!("cannot write payload file: {e}")))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
