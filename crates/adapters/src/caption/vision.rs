//! Vision-model captioner over an OpenAI-compatible chat completions API

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use review_guard_domain::usecases::RetryPolicy;
use review_guard_domain::{Caption, CaptionError, Captioner, ImageRef};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{CaptionConfig, data_url, load_image, sniff_image};

const CAPTION_INSTRUCTION: &str = "Describe this photo in one short sentence. \
Mention any visible text, logos, prices or promotional material.";

/// Captions images by asking a vision-capable chat model
pub struct VisionCaptioner {
    api_key: Option<SecretString>,
    base_url: String,
    config: CaptionConfig,
    retry: RetryPolicy,
    client: OnceLock<Client>,
}

/// Outcome of one failed caption request
enum RequestFailure {
    /// Rate limiting, 5xx or a dropped connection; worth another attempt
    Transient(CaptionError),
    Permanent(CaptionError),
}

impl VisionCaptioner {
    pub fn new(api_key: Option<SecretString>, base_url: String, config: CaptionConfig) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            retry: RetryPolicy::default(),
            client: OnceLock::new(),
        }
    }

    /// Retry policy for rate limits and server errors of the caption endpoint
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Shared HTTP client, built on first use
    fn client(&self) -> Result<&Client, CaptionError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| CaptionError::Model(format!("Failed to build HTTP client: {}", e)))?;

        Ok(self.client.get_or_init(|| client))
    }

    async fn describe(&self, client: &Client, image_url: &str) -> Result<String, CaptionError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying caption request");
                tokio::time::sleep(delay).await;
            }

            match self.request_caption(client, image_url).await {
                Ok(text) => return Ok(text),
                Err(RequestFailure::Transient(error)) if attempt < max_attempts => {
                    tracing::warn!(attempt, error = %error, "Caption request failed");
                }
                Err(RequestFailure::Transient(error) | RequestFailure::Permanent(error)) => {
                    return Err(error);
                }
            }
        }
    }

    async fn request_caption(
        &self,
        client: &Client,
        image_url: &str,
    ) -> Result<String, RequestFailure> {
        let request = CaptionRequest {
            model: self.config.model.clone(),
            messages: vec![json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": CAPTION_INSTRUCTION },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            })],
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestFailure::Transient(CaptionError::Model(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = CaptionError::Model(format!("API returned {}: {}", status, body));
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                RequestFailure::Transient(error)
            } else {
                RequestFailure::Permanent(error)
            });
        }

        let api_response: CaptionResponse = response.json().await.map_err(|e| {
            RequestFailure::Permanent(CaptionError::Model(format!("Invalid response: {}", e)))
        })?;

        Ok(api_response
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

#[derive(Serialize)]
struct CaptionRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CaptionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl Captioner for VisionCaptioner {
    async fn caption(&self, image: &ImageRef) -> Result<Caption, CaptionError> {
        let client = self.client()?;
        let bytes = load_image(image, Some(client)).await?;
        let mime_type = sniff_image(&bytes)?;

        tracing::debug!(
            image = %image.describe(),
            mime_type,
            size = bytes.len(),
            "Requesting caption"
        );

        let raw = self.describe(client, &data_url(&bytes, mime_type)).await?;
        let caption = Caption::new(&raw, self.config.max_chars);
        if caption.is_empty() {
            return Err(CaptionError::Empty);
        }

        Ok(caption)
    }
}
