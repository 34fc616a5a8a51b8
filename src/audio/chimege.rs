use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use super::structs::synthesis_options::SynthesisOptions;
use crate::{
    errors::{constants::SPEECH_TIMEOUT_UNITS, GenError, Result},
    utils::units,
};

const API_URL: &str = "https://api.chimege.com/v1.2";
const SERVICE: &str = "chimege";

/// Speech-synthesis service seam. Returns the raw audio body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Bytes>;
}

/// Last four characters of a secret, for logs.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "MISSING".to_string();
    }
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", tail)
}

#[derive(Clone)]
pub struct ChimegeClient {
    client: Client,
    token: String,
    base_url: String,
}

impl std::fmt::Debug for ChimegeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChimegeClient")
            .field("token", &mask_token(&self.token))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChimegeClient {
    /// Every call is capped at 60 time units.
    pub fn new(token: impl Into<String>, time_unit: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(units(time_unit, SPEECH_TIMEOUT_UNITS))
            .build()
            .map_err(|e| GenError::config(format!("Failed to build speech client: {}", e)))?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechBackend for ChimegeClient {
    #[tracing::instrument(skip(self, text), fields(voice_id = %options.voice_id, chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Bytes> {
        debug!(
            voice_id = %options.voice_id,
            speed = options.speed,
            pitch = options.pitch,
            sample_rate = options.sample_rate,
            token = %mask_token(&self.token),
            "Sending synthesis request"
        );

        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("token", &self.token)
            .header("voice-id", &options.voice_id)
            .header("speed", options.speed.to_string())
            .header("pitch", options.pitch.to_string())
            .header("sample-rate", options.sample_rate.to_string())
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send request to Chimege API");
                GenError::http(SERVICE, e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await.unwrap_or_default();
            let message = String::from_utf8_lossy(&body).into_owned();
            error!(status = %status, body = %message, "Chimege API returned error");
            return Err(GenError::transport(
                SERVICE,
                Some(status.as_u16()),
                format!("API returned status {}: {}", status.as_u16(), message),
            ));
        }

        response.bytes().await.map_err(|e| GenError::http(SERVICE, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ChimegeClient {
        ChimegeClient::new("secret-token", Duration::from_millis(100))
            .unwrap()
            .with_base_url(server.base_url())
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abcdef123"), "***f123");
        assert_eq!(mask_token("ab"), "***ab");
        assert_eq!(mask_token(""), "MISSING");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = ChimegeClient::new("secret-token", Duration::from_millis(1)).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("***oken"));
    }

    #[tokio::test]
    async fn test_synthesize_sends_headers_and_body() {
        let server = MockServer::start_async().await;
        let audio = vec![7u8; 256];
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/synthesize")
                    .header("token", "secret-token")
                    .header("voice-id", "MALE1")
                    .header("speed", "1")
                    .header("pitch", "1")
                    .header("sample-rate", "22050")
                    .body("Сайн байна уу");
                then.status(200).body(audio.clone());
            })
            .await;

        let bytes = client(&server)
            .synthesize("Сайн байна уу", &SynthesisOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes.len(), 256);
    }

    #[tokio::test]
    async fn test_client_error_becomes_transport_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/synthesize");
                then.status(429).body("Too many requests");
            })
            .await;

        let error = client(&server)
            .synthesize("Сайн", &SynthesisOptions::default())
            .await
            .unwrap_err();

        assert!(error.is_rate_limited());
        assert!(error.to_string().contains("Too many requests"));
    }

    #[tokio::test]
    async fn test_server_error_becomes_transport() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/synthesize");
                then.status(503).body("unavailable");
            })
            .await;

        let error = client(&server)
            .synthesize("Сайн", &SynthesisOptions::default())
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(503));
    }
}
