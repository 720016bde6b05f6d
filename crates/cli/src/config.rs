//! Configuration loading and management

use anyhow::{Context, Result};
use review_guard_adapters::results::OutputFormat;
use review_guard_domain::usecases::CaptionFailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub caption: CaptionConfig,

    #[serde(default)]
    pub prompt: PromptConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first one
    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub openai_compat: OpenAiCompatConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    #[serde(default = "default_groq_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_groq_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// vision, stub or none
    #[serde(default = "default_caption_provider")]
    pub provider: String,

    #[serde(default = "default_caption_model")]
    pub model: String,

    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    /// Empty means the endpoint needs no key
    #[serde(default = "default_groq_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_caption_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_caption_max_chars")]
    pub max_chars: usize,

    #[serde(default)]
    pub on_failure: CaptionFailurePolicy,

    #[serde(default = "default_caption_timeout")]
    pub timeout_secs: u64,

    /// Caption returned by the stub provider
    #[serde(default = "default_stub_caption")]
    pub stub_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Truncate longer review texts (unset = embed verbatim)
    #[serde(default)]
    pub max_review_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Limit for the whole batch (unset = unlimited)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub output_format: OutputFormat,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "openai_compat".to_string()
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_temperature() -> f64 {
    0.0
}

fn default_timeout() -> u64 {
    45
}

fn default_llm_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    800
}

fn default_max_output_tokens() -> u32 {
    300
}

fn default_groq_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_caption_provider() -> String {
    "vision".to_string()
}

fn default_caption_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
}

fn default_caption_max_tokens() -> u32 {
    40
}

fn default_caption_max_chars() -> usize {
    300
}

fn default_caption_timeout() -> u64 {
    60
}

fn default_stub_caption() -> String {
    "a photo of the place".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            retries: default_llm_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_output_tokens: default_max_output_tokens(),
            openai_compat: OpenAiCompatConfig::default(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_groq_api_key_env(),
            base_url: default_groq_base_url(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_api_key_env(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_api_key_env(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            provider: default_caption_provider(),
            model: default_caption_model(),
            base_url: default_groq_base_url(),
            api_key_env: default_groq_api_key_env(),
            max_tokens: default_caption_max_tokens(),
            max_chars: default_caption_max_chars(),
            on_failure: CaptionFailurePolicy::default(),
            timeout_secs: default_caption_timeout(),
            stub_text: default_stub_caption(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_secs: None,
            output_format: OutputFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("REVIEW_GUARD")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# review-guard configuration
# Every key can be overridden from the environment, e.g.
#   REVIEW_GUARD__LLM__PROVIDER=stub

[general]
log_level = "info"

[llm]
provider = "openai_compat"  # openai_compat, anthropic, gemini, ollama, stub
model = "llama-3.1-8b-instant"
temperature = 0.0
timeout_secs = 45
retries = 2                 # extra attempts after the first
retry_base_delay_ms = 800   # doubled after every failed attempt
max_output_tokens = 300

[llm.openai_compat]
api_key_env = "GROQ_API_KEY"
base_url = "https://api.groq.com/openai/v1"

[llm.anthropic]
api_key_env = "ANTHROPIC_API_KEY"

[llm.gemini]
api_key_env = "GEMINI_API_KEY"

[llm.ollama]
base_url = "http://localhost:11434"

[caption]
provider = "vision"         # vision, stub, none
model = "meta-llama/llama-4-scout-17b-16e-instruct"
base_url = "https://api.groq.com/openai/v1"
api_key_env = "GROQ_API_KEY"
max_tokens = 40
max_chars = 300
on_failure = "text_only"    # text_only, fail
timeout_secs = 60

[prompt]
# max_review_chars = 4000

[batch]
max_concurrent = 4
# timeout_secs = 600
output_format = "json"      # json, jsonl
"#
        .to_string()
    }
}
