//! Classify command - one-shot classification of a single review

use anyhow::{Context, Result, bail};
use review_guard_adapters::{
    caption::{CaptionConfig as AdapterCaptionConfig, StubCaptioner, VisionCaptioner},
    llm::{
        AnthropicClassifier, GeminiClassifier, LlmConfig as AdapterLlmConfig, OllamaClassifier,
        OpenAiCompatClassifier, StubClassifier,
    },
};
use review_guard_domain::usecases::{BatchConfig, BatchRunner, RetryPolicy};
use review_guard_domain::{
    BatchEntry, Captioner, Classifier, ImageRef, PromptConfig, Review, SystemClock,
};
use secrecy::SecretString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::ClassifyArgs;
use crate::config::AppConfig;

pub async fn execute(args: ClassifyArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    // Get text to classify
    let text = get_input_text(&args)?;

    if text.trim().is_empty() && args.image.is_none() {
        bail!("No text provided for classification");
    }

    let mut review = Review::new("cli-input", text).with_place(
        args.place_name.clone(),
        args.place_category.clone(),
        args.rating,
    );
    if let Some(image) = args.image.as_deref() {
        review = review.with_image(ImageRef::from(image));
    }

    // Providers are resolved up front so a missing key fails before any request
    let classifier: Arc<dyn Classifier> = Arc::from(build_classifier(&config)?);
    let captioner = build_captioner(&config)?;
    ensure_reachable(classifier.as_ref(), &config).await?;

    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        text_length = review.text.len(),
        has_image = review.image.is_some(),
        "Classifying review"
    );

    let runner = BatchRunner::new(
        classifier,
        captioner,
        Arc::new(SystemClock),
        batch_config(&config),
    );
    let entry = runner.process_review(&review).await;

    // Output results
    if args.json {
        let json = serde_json::to_string_pretty(&entry).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        print_entry(&entry);
    }

    if entry.is_failed() {
        bail!(
            "Classification failed: {}",
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn print_entry(entry: &BatchEntry) {
    println!("Classification Result");
    println!("=====================");
    println!();

    match entry.label {
        Some(label) => match entry.confidence {
            Some(confidence) => println!("Label: {} (confidence: {:.2})", label, confidence),
            None => println!("Label: {}", label),
        },
        None => println!("Label: -"),
    }

    if let Some(relevant) = entry.relevant {
        println!("Relevant: {}", relevant);
    }
    if let Some(rationale) = &entry.rationale {
        println!("Rationale: {}", rationale);
    }
    if !entry.indicators.is_empty() {
        println!("Indicators:");
        for indicator in &entry.indicators {
            println!("  - \"{}\"", indicator);
        }
    }
    if let Some(caption) = &entry.caption {
        println!("Image caption: {}", caption);
    }
    if let Some(caption_error) = &entry.caption_error {
        println!("Caption skipped: {}", caption_error);
    }
    println!("Attempts: {}", entry.attempts);
}

pub(crate) fn build_classifier(config: &AppConfig) -> Result<Box<dyn Classifier>> {
    let llm_config = adapter_llm_config(&config.llm);

    match config.llm.provider.as_str() {
        "openai_compat" | "groq" => {
            let base_url = config.llm.openai_compat.base_url.trim();
            if base_url.is_empty() {
                bail!("OpenAI-compatible base_url is required");
            }
            let api_key = load_api_key(&config.llm.openai_compat.api_key_env, "openai_compat")?;
            Ok(Box::new(
                OpenAiCompatClassifier::new(api_key, base_url.to_string(), llm_config)
                    .context("Failed to configure OpenAI-compatible provider")?,
            ))
        }
        "anthropic" => {
            let api_key = load_api_key(&config.llm.anthropic.api_key_env, "anthropic")?;
            Ok(Box::new(
                AnthropicClassifier::new(api_key, llm_config)
                    .context("Failed to configure Anthropic provider")?,
            ))
        }
        "gemini" => {
            let api_key = load_api_key(&config.llm.gemini.api_key_env, "gemini")?;
            Ok(Box::new(
                GeminiClassifier::new(api_key, llm_config)
                    .context("Failed to configure Gemini provider")?,
            ))
        }
        "ollama" => {
            let base_url = config.llm.ollama.base_url.trim();
            let classifier = if base_url.is_empty() {
                OllamaClassifier::new(llm_config)
            } else {
                OllamaClassifier::with_base_url(base_url.to_string(), llm_config)
            };
            Ok(Box::new(
                classifier.context("Failed to configure Ollama provider")?,
            ))
        }
        "stub" => Ok(Box::new(StubClassifier::heuristic())),
        other => bail!("Unknown LLM provider: {}", other),
    }
}

/// Stop before any review is processed when the LLM endpoint cannot be used
pub(crate) async fn ensure_reachable(
    classifier: &dyn Classifier,
    config: &AppConfig,
) -> Result<()> {
    classifier
        .preflight()
        .await
        .with_context(|| format!("LLM endpoint check failed for provider {}", config.llm.provider))
}

pub(crate) fn build_captioner(config: &AppConfig) -> Result<Arc<dyn Captioner>> {
    let caption = &config.caption;

    match caption.provider.as_str() {
        "vision" => {
            let api_key = if caption.api_key_env.trim().is_empty() {
                None
            } else {
                Some(load_api_key(&caption.api_key_env, "caption")?)
            };
            Ok(Arc::new(
                VisionCaptioner::new(
                    api_key,
                    caption.base_url.clone(),
                    AdapterCaptionConfig {
                        model: caption.model.clone(),
                        max_tokens: caption.max_tokens,
                        max_chars: caption.max_chars,
                        timeout_secs: caption.timeout_secs,
                    },
                )
                .with_retry(retry_policy(config)),
            ))
        }
        "stub" => Ok(Arc::new(
            StubCaptioner::fixed(caption.stub_text.clone()).with_max_chars(caption.max_chars),
        )),
        "none" => Ok(Arc::new(StubCaptioner::disabled())),
        other => bail!("Unknown caption provider: {}", other),
    }
}

pub(crate) fn batch_config(config: &AppConfig) -> BatchConfig {
    BatchConfig {
        max_concurrent: config.batch.max_concurrent,
        caption_failure: config.caption.on_failure,
        timeout: config
            .batch
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        retry: retry_policy(config),
        prompt: PromptConfig {
            max_review_chars: config.prompt.max_review_chars,
        },
    }
}

/// `llm.retries` counts extra attempts after the first
fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.llm.retries.saturating_add(1),
        base_delay: Duration::from_millis(config.llm.retry_base_delay_ms),
    }
}

fn adapter_llm_config(config: &crate::config::LlmConfig) -> AdapterLlmConfig {
    AdapterLlmConfig {
        model: config.model.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
        timeout_secs: config.timeout_secs,
    }
}

pub(crate) fn load_api_key(env_var: &str, provider: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for provider {}", provider);
    }

    let key = std::env::var(env_var).with_context(|| {
        format!(
            "Missing API key env var {} for provider {}",
            env_var, provider
        )
    })?;

    if key.trim().is_empty() {
        bail!(
            "API key env var {} is empty for provider {}",
            env_var,
            provider
        );
    }

    Ok(SecretString::new(key.into()))
}

fn get_input_text(args: &ClassifyArgs) -> Result<String> {
    if let Some(ref text) = args.text {
        return Ok(text.clone());
    }

    let read_stdin = || -> Result<String> {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        Ok(text)
    };

    match &args.file {
        Some(path) if path.as_os_str() == "-" => read_stdin(),
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        // An image-only review needs no text
        None if args.image.is_some() => Ok(String::new()),
        None => read_stdin(),
    }
}
