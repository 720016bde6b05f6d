//! Ollama local LLM adapter

use async_trait::async_trait;
use review_guard_domain::{Classifier, ClassifyError, Prompt, Verdict};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, check_endpoint, check_status, http_client, map_send_error, parse_verdict_response,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama classifier for local LLMs
pub struct OllamaClassifier {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OllamaClassifier {
    pub fn new(config: LlmConfig) -> Result<Self, ClassifyError> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(base_url: String, config: LlmConfig) -> Result<Self, ClassifyError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    async fn call_api(&self, prompt: &Prompt) -> Result<String, ClassifyError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.user.clone(),
            system: Some(prompt.system.clone()),
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_output_tokens as i32,
            },
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: OllamaResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClassifyError::SchemaViolation(e.to_string()))?;

        if api_response.response.is_empty() {
            return Err(ClassifyError::SchemaViolation("Empty response".to_string()));
        }

        Ok(api_response.response)
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: i32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        let response_text = self.call_api(prompt).await?;
        parse_verdict_response(&response_text)
    }

    async fn preflight(&self) -> Result<(), ClassifyError> {
        check_endpoint(self.client.get(format!("{}/api/tags", self.base_url))).await
    }
}
