//! LLM provider adapters

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai_compat;
pub mod stub;

pub use anthropic::AnthropicClassifier;
pub use gemini::GeminiClassifier;
pub use ollama::OllamaClassifier;
pub use openai_compat::OpenAiCompatClassifier;
pub use stub::StubClassifier;

use review_guard_domain::{ClassifyError, Label, Verdict};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Temperature (0.0 for deterministic labeling)
    pub temperature: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            max_output_tokens: 300,
            timeout_secs: 45,
        }
    }
}

/// Build the HTTP client shared by all requests of one adapter
pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, ClassifyError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ClassifyError::Config(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn map_send_error(error: reqwest::Error) -> ClassifyError {
    if error.is_timeout() {
        ClassifyError::Timeout
    } else {
        ClassifyError::Network(error.to_string())
    }
}

/// Turn non-success statuses into errors, passing successful responses through
pub(crate) async fn check_status(response: Response) -> Result<Response, ClassifyError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ClassifyError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClassifyError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Send a cheap read-only request to confirm the provider answers.
///
/// A connection failure or rejected credentials is a configuration error.
/// Any other status counts as reachable: not every compatible server
/// exposes a model listing.
pub(crate) async fn check_endpoint(request: RequestBuilder) -> Result<(), ClassifyError> {
    let response = request.send().await.map_err(|e| {
        ClassifyError::Config(format!("Endpoint unreachable: {}", map_send_error(e)))
    })?;

    let status = response.status();
    if matches!(status.as_u16(), 401 | 403) {
        return Err(ClassifyError::Config(format!(
            "Endpoint rejected the API key ({})",
            status
        )));
    }

    tracing::debug!(url = %response.url(), status = %status, "Endpoint reachable");
    Ok(())
}

/// Parse and strictly validate a model response into a verdict.
///
/// The response must be a single JSON object whose `label` is one string
/// from the closed label set. `confidence`, when present, must lie in 0..=1.
pub fn parse_verdict_response(response: &str) -> Result<Verdict, ClassifyError> {
    let json_str = extract_json(response);

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ClassifyError::SchemaViolation(format!("Failed to parse JSON: {}", e)))?;

    let Value::Object(object) = value else {
        return Err(ClassifyError::SchemaViolation(
            "Expected a JSON object".to_string(),
        ));
    };

    let label = match object.get("label") {
        None | Some(Value::Null) => {
            return Err(ClassifyError::SchemaViolation(
                "Missing 'label' field".to_string(),
            ));
        }
        Some(Value::String(raw)) => raw
            .trim()
            .to_ascii_lowercase()
            .parse::<Label>()
            .map_err(|e| ClassifyError::SchemaViolation(e.to_string()))?,
        Some(Value::Array(_)) => {
            return Err(ClassifyError::SchemaViolation(
                "'label' must be a single string, got a list".to_string(),
            ));
        }
        Some(other) => {
            return Err(ClassifyError::SchemaViolation(format!(
                "'label' must be a string, got {}",
                other
            )));
        }
    };

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => Some(c),
            _ => {
                return Err(ClassifyError::SchemaViolation(format!(
                    "'confidence' out of range 0..=1: {}",
                    n
                )));
            }
        },
        Some(other) => {
            return Err(ClassifyError::SchemaViolation(format!(
                "'confidence' must be a number, got {}",
                other
            )));
        }
    };

    let rationale = object
        .get("rationale")
        .or_else(|| object.get("reasoning"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let indicators = object
        .get("indicators")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Verdict {
        label,
        confidence,
        relevant: object.get("relevant").and_then(Value::as_bool),
        rationale,
        indicators,
        raw_response: response.to_string(),
    })
}

/// Extract JSON from response (handles markdown code blocks)
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Check for ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return trimmed[start + 7..start + 7 + end].trim();
        }
    }

    // Check for ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let content = trimmed[start + 3..start + 3 + end].trim();
            // Skip language identifier if present
            if let Some(newline) = content.find('\n') {
                let first_line = &content[..newline];
                if !first_line.starts_with('{') {
                    return content[newline + 1..].trim();
                }
            }
            return content;
        }
    }

    // Assume raw JSON
    trimmed
}
