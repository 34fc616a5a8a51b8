use async_trait::async_trait;
use reqwest::Client;
use tracing::error;

use super::structs::image_request::{ImageRequest, ImageResponse};
use crate::errors::{GenError, Result};

const API_URL: &str = "https://api.magichour.ai";
const SERVICE: &str = "magic-hour";

/// Image-generation service seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse>;
}

#[derive(Clone)]
pub struct MagicHourClient {
    client: Client,
    token: String,
    base_url: String,
}

impl std::fmt::Debug for MagicHourClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicHourClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MagicHourClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ImageBackend for MagicHourClient {
    #[tracing::instrument(skip(self, request), fields(size = %request.size))]
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let response = self
            .client
            .post(format!("{}/v1/ai-image-generator", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send request to Magic Hour API");
                GenError::http(SERVICE, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "Magic Hour API returned error");
            return Err(GenError::transport(SERVICE, Some(status.as_u16()), message));
        }

        response.json().await.map_err(|e| {
            GenError::invalid_response(SERVICE, format!("Failed to decode response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::structs::image_style::ImageStyle;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> ImageRequest {
        ImageRequest::new("foggy pier", ImageStyle::resolve(None, "foggy pier"))
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["image_count"], 1);
        assert_eq!(value["size"], "1024x1024");
        assert_eq!(value["quality"], "standard");
        assert_eq!(value["style"]["prompt"], "foggy pier");
        assert_eq!(value["style"]["type"], "cinematic");
    }

    #[tokio::test]
    async fn test_generate_returns_first_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/ai-image-generator")
                    .header("authorization", "Bearer token");
                then.status(200)
                    .json_body(json!({"data": [{"url": "https://cdn/img.png"}]}));
            })
            .await;

        let client = MagicHourClient::new("token").with_base_url(server.base_url());
        let response = client.generate(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.first_url(), Some("https://cdn/img.png"));
    }

    #[tokio::test]
    async fn test_generate_maps_content_policy_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/ai-image-generator");
                then.status(400)
                    .body("Request blocked by content policy");
            })
            .await;

        let client = MagicHourClient::new("token").with_base_url(server.base_url());
        let error = client.generate(&request()).await.unwrap_err();

        assert!(error.is_content_policy());
        assert_eq!(error.status(), Some(400));
    }

    #[tokio::test]
    async fn test_generate_without_data_has_no_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/ai-image-generator");
                then.status(200).json_body(json!({"id": "abc"}));
            })
            .await;

        let client = MagicHourClient::new("token").with_base_url(server.base_url());
        let response = client.generate(&request()).await.unwrap();
        assert_eq!(response.first_url(), None);
    }
}
