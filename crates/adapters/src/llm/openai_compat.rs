//! OpenAI-compatible chat completions adapter (Groq, OpenAI and similar providers)

use async_trait::async_trait;
use review_guard_domain::{Classifier, ClassifyError, Prompt, Verdict};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, check_endpoint, check_status, http_client, map_send_error, parse_verdict_response,
};

/// Default endpoint: Groq's OpenAI-compatible API
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Classifier for any provider exposing `/chat/completions`
pub struct OpenAiCompatClassifier {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl OpenAiCompatClassifier {
    pub fn new(
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
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: Some(self.config.max_output_tokens),
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: ChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClassifyError::SchemaViolation(e.to_string()))?;

        let text = api_response
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ClassifyError::SchemaViolation("Empty response".to_string()));
        }

        Ok(text)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
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
impl Classifier for OpenAiCompatClassifier {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        let response_text = self.call_api(prompt).await?;
        parse_verdict_response(&response_text)
    }

    async fn preflight(&self) -> Result<(), ClassifyError> {
        check_endpoint(
            self.client
                .get(format!("{}/models", self.base_url))
                .header(
                    "Authorization",
                    format!("Bearer {}", self.api_key.expose_secret()),
                ),
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

    fn sample_prompt() -> Prompt {
        PromptBuilder::default().build(
            &Review::new("1", "Best pizza in town, visit www.buyfakepizza.com for discounts!"),
            None,
        )
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    async fn classifier_for(server: &MockServer) -> OpenAiCompatClassifier {
        OpenAiCompatClassifier::new(
            SecretString::new("test-key".into()),
            server.uri(),
            LlmConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_classify_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"label":"advertisement","confidence":0.97,"relevant":false,"rationale":"promo link","indicators":["www.buyfakepizza.com"]}"#,
            )))
            .mount(&mock_server)
            .await;

        let verdict = classifier_for(&mock_server)
            .await
            .classify(&sample_prompt())
            .await
            .unwrap();

        assert_eq!(verdict.label, Label::Advertisement);
        assert_eq!(verdict.confidence, Some(0.97));
        assert_eq!(verdict.indicators, vec!["www.buyfakepizza.com"]);
    }

    #[tokio::test]
    async fn test_request_is_deterministic_single_turn_json() {
        let mock_server = MockServer::start().await;
        let prompt = sample_prompt();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "temperature": 0.0,
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": prompt.system },
                    { "role": "user", "content": prompt.user }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"label":"ok"}"#)))
            .expect(2)
            .mount(&mock_server)
            .await;

        let classifier = classifier_for(&mock_server).await;
        let first = classifier.classify(&prompt).await.unwrap();
        let second = classifier.classify(&prompt).await.unwrap();
        assert_eq!(first.label, second.label);
    }

    #[tokio::test]
    async fn test_invalid_label_is_schema_violation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(r#"{"label":"totally_spam","confidence":0.4}"#)),
            )
            .mount(&mock_server)
            .await;

        let result = classifier_for(&mock_server)
            .await
            .classify(&sample_prompt())
            .await;

        assert!(matches!(result, Err(ClassifyError::SchemaViolation(_))));
    }

    #[tokio::test]
    async fn test_classify_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let result = classifier_for(&mock_server)
            .await
            .classify(&sample_prompt())
            .await;

        assert!(matches!(result, Err(ClassifyError::RateLimited)));
    }

    #[tokio::test]
    async fn test_classify_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal error"))
            .mount(&mock_server)
            .await;

        let result = classifier_for(&mock_server)
            .await
            .classify(&sample_prompt())
            .await;

        match result {
            Err(ClassifyError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_preflight_lists_models() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        classifier_for(&mock_server).await.preflight().await.unwrap();
    }

    #[tokio::test]
    async fn test_preflight_rejected_key_is_config_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = classifier_for(&mock_server).await.preflight().await;
        assert!(matches!(result, Err(ClassifyError::Config(_))));
    }

    #[tokio::test]
    async fn test_preflight_unreachable_endpoint_is_config_error() {
        let classifier = OpenAiCompatClassifier::new(
            SecretString::new("test-key".into()),
            "http://127.0.0.1:9".to_string(),
            LlmConfig::default(),
        )
        .unwrap();

        match classifier.preflight().await {
            Err(ClassifyError::Config(message)) => assert!(message.contains("unreachable")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
