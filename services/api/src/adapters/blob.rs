//! services/api/src/adapters/blob.rs
//!
//! Image storage adapters implementing the `BlobStore` port. Uploads go to
//! Cloudinary using its signed upload API; the returned `secure_url` is what the
//! rest of the system stores and hands to the worker.

use crate::config::CloudinaryConfig;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use neurostudy_core::ports::{BlobStore, PortError, PortResult};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{error, info};

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone)]
pub struct CloudinaryBlobStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryBlobStore {
    pub fn new(client: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { client, config }
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", CLOUDINARY_API_BASE, self.config.cloud_name)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary request signature: the signed parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended, hashed with SHA-256.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl BlobStore for CloudinaryBlobStore {
    async fn store(&self, data: Bytes, content_type: &str) -> PortResult<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", self.config.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let size = data.len();
        let file = Part::bytes(data.to_vec())
            .file_name("note")
            .mime_str(content_type)
            .map_err(|e| PortError::Unexpected(format!("invalid content type: {}", e)))?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("blob upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Cloudinary rejected upload ({}): {}", status, body);
            return Err(PortError::Unexpected(format!("blob store returned {}", status)));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unreadable blob store response: {}", e)))?;
        info!("Stored {} byte image at {}", size, uploaded.secure_url);
        Ok(uploaded.secure_url)
    }
}

/// Used when no image store credentials are configured: the API still serves
/// every other route, and uploads fail as internal errors.
#[derive(Clone, Default)]
pub struct UnconfiguredBlobStore;

#[async_trait]
impl BlobStore for UnconfiguredBlobStore {
    async fn store(&self, _data: Bytes, _content_type: &str) -> PortResult<String> {
        Err(PortError::Unexpected("no blob store is configured".to_string()))
    }
}
