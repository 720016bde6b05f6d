//! Google Gemini API adapter

use async_trait::async_trait;
use review_guard_domain::{Classifier, ClassifyError, Prompt, Verdict};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, check_endpoint, check_status, http_client, map_send_error, parse_verdict_response,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini classifier
pub struct GeminiClassifier {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl GeminiClassifier {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Result<Self, ClassifyError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(
        api_key: SecretString,
        base_url: String,
        config: LlmConfig,
    ) -> Result<Self, ClassifyError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    async fn call_api(&self, prompt: &Prompt) -> Result<String, ClassifyError> {
        let request = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.user.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: prompt.system.clone(),
                }],
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: GeminiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClassifyError::SchemaViolation(e.to_string()))?;

        let text = api_response
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ClassifyError::SchemaViolation("Empty response".to_string()));
        }

        Ok(text)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction")]
    system_instruction: SystemInstruction,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        let response_text = self.call_api(prompt).await?;
        parse_verdict_response(&response_text)
    }

    async fn preflight(&self) -> Result<(), ClassifyError> {
        check_endpoint(
            self.client
                .get(format!("{}/models", self.base_url))
                .header("x-goog-api-key", self.api_key.expose_secret()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_guard_domain::{Label, PromptBuilder, Review};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_classify_success_requests_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [
                    { "content": { "parts": [ { "text": "{\"label\":\"irrelevant\"}" } ] } }
                ]
            })))
            .mount(&mock_server)
            .await;

        let classifier = GeminiClassifier::with_base_url(
            SecretString::new("test-key".into()),
            mock_server.uri(),
            LlmConfig {
                model: "gemini-2.0-flash".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let prompt = PromptBuilder::default()
            .build(&Review::new("1", "My cat loves this new toy I bought online"), None);
        let verdict = classifier.classify(&prompt).await.unwrap();

        assert_eq!(verdict.label, Label::Irrelevant);
    }
}
