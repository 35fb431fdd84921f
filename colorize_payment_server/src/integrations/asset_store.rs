use std::time::Duration;

use bytes::Bytes;
use log::*;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AssetStoreError {
    /// Nothing is stored at the location (yet).
    #[error("No asset at {0}")]
    NotFound(String),
    #[error("The asset store is unavailable. {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBytes {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Read access to the object storage holding finished images.
#[allow(async_fn_in_trait)]
pub trait AssetStore {
    async fn fetch(&self, location: &str) -> Result<AssetBytes, AssetStoreError>;
}

/// Fetches assets over HTTP(S), e.g. from a public or pre-signed bucket URL.
#[derive(Clone)]
pub struct HttpAssetStore {
    client: reqwest::Client,
}

impl HttpAssetStore {
    pub fn new(timeout: Duration) -> Result<Self, AssetStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetStoreError::Unavailable(format!("Could not build HTTP client. {e}")))?;
        Ok(Self { client })
    }
}

impl AssetStore for HttpAssetStore {
    async fn fetch(&self, location: &str) -> Result<AssetBytes, AssetStoreError> {
        trace!("🖼️ Fetching asset from {location}");
        let response = self.client.get(location).send().await.map_err(|e| {
            warn!("🖼️ Could not reach the asset store. {e}");
            AssetStoreError::Unavailable(e.to_string())
        })?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                return Err(AssetStoreError::NotFound(location.to_string()));
            },
            s if !s.is_success() => {
                warn!("🖼️ The asset store answered {s} for {location}");
                return Err(AssetStoreError::Unavailable(format!("status {s}")));
            },
            _ => {},
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| AssetStoreError::Unavailable(e.to_string()))?;
        debug!("🖼️ Fetched {} bytes ({content_type}) from the asset store", bytes.len());
        Ok(AssetBytes { bytes, content_type })
    }
}
