use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use super::ObjectStore;
use crate::{
    config::CloudinaryConfig,
    errors::{GenError, Result},
};

const API_URL: &str = "https://api.cloudinary.com";
const SERVICE: &str = "cloudinary";
const RESOURCE_TYPE: &str = "video";

#[derive(Deserialize, Debug)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// SHA-256 request signature: the parameters sorted by name, joined as
/// `key=value` with `&`, followed by the API secret.
pub fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Signed uploads to a Cloudinary account. Audio goes up as the `video`
/// resource type.
#[derive(Clone)]
pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
    base_url: String,
}

impl std::fmt::Debug for CloudinaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryStore")
            .field("cloud_name", &self.config.cloud_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn upload_params(&self, filename: &str, folder: &str, timestamp: i64) -> BTreeMap<&'static str, String> {
        let (public_id, format) = match filename.rsplit_once('.') {
            Some((stem, extension)) => (stem, extension),
            None => (filename, ""),
        };

        BTreeMap::from([
            ("folder", folder.to_string()),
            ("format", format.to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.to_string()),
        ])
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    #[tracing::instrument(skip(self, buffer), fields(size = buffer.len()))]
    async fn upload_buffer(&self, buffer: Bytes, filename: &str, folder: &str) -> Result<String> {
        let params = self.upload_params(filename, folder, chrono::Utc::now().timestamp());
        let signature = sign(&params, &self.config.api_secret);

        let file = Part::bytes(buffer.to_vec())
            .file_name(filename.to_string());
        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            if !value.is_empty() {
                form = form.text(key, value);
            }
        }

        let response = self
            .client
            .post(format!(
                "{}/v1_1/{}/{}/upload",
                self.base_url, self.config.cloud_name, RESOURCE_TYPE
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send upload to Cloudinary");
                GenError::http(SERVICE, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "Cloudinary returned error");
            return Err(GenError::transport(SERVICE, Some(status.as_u16()), message));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            GenError::invalid_response(SERVICE, format!("Failed to decode response: {}", e))
        })?;

        let url = body
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GenError::invalid_response(SERVICE, "Upload response has no secure_url"))?;

        info!(url = %url, "Uploaded buffer");
        Ok(url)
    }
}
