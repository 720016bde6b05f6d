//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::commands::classify::{build_captioner, build_classifier, ensure_reachable};
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    llm: CheckResult,
    caption: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        llm: CheckResult::error("Not checked"),
        caption: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    if let Some(config) = check_config(&mut report, config_path) {
        report.llm = check_llm(&config).await;
        report.caption = check_caption(&config);
    }

    let checks = [&report.config, &report.llm, &report.caption];
    report.overall = if checks.iter().any(|c| c.is_error()) {
        "error".to_string()
    } else if checks.iter().all(|c| c.is_ok()) {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_config(report: &mut DoctorReport, config_path: Option<PathBuf>) -> Option<AppConfig> {
    match AppConfig::load(config_path.as_deref()) {
        Ok(config) => {
            report.config = CheckResult::ok("Configuration loaded successfully").with_details(
                serde_json::json!({
                    "retries": config.llm.retries,
                    "max_concurrent": config.batch.max_concurrent,
                    "caption_on_failure": config.caption.on_failure,
                    "output_format": config.batch.output_format,
                }),
            );
            Some(config)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    }
}

async fn check_llm(config: &AppConfig) -> CheckResult {
    let provider = &config.llm.provider;
    let model = &config.llm.model;

    // Building the classifier resolves the API key without revealing it
    let classifier = match build_classifier(config) {
        Ok(classifier) => classifier,
        Err(e) => return CheckResult::error(format!("Provider: {}, {:#}", provider, e)),
    };

    if let Err(e) = ensure_reachable(classifier.as_ref(), config).await {
        return CheckResult::error(format!("{:#}", e));
    }

    if provider == "stub" {
        CheckResult::warn("Provider: stub (offline keyword heuristic, not for production use)")
    } else {
        CheckResult::ok(format!(
            "Provider: {}, Model: {}, temperature: {} (endpoint reachable)",
            provider, model, config.llm.temperature
        ))
    }
}

fn check_caption(config: &AppConfig) -> CheckResult {
    let caption = &config.caption;

    match (caption.provider.as_str(), build_captioner(config)) {
        (_, Err(e)) => CheckResult::error(format!("Provider: {}, {:#}", caption.provider, e)),
        ("none", Ok(_)) => {
            CheckResult::warn("Captioning disabled; image reviews are classified on text only")
        }
        ("stub", Ok(_)) => CheckResult::warn(format!(
            "Provider: stub, fixed caption \"{}\"",
            caption.stub_text
        )),
        (provider, Ok(_)) => CheckResult::ok(format!(
            "Provider: {}, Model: {}, max_tokens: {}, max_chars: {}",
            provider, caption.model, caption.max_tokens, caption.max_chars
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("review-guard Doctor Report");
    println!("==========================");
    println!();

    print_check("Config", &report.config);
    print_check("LLM Provider", &report.llm);
    print_check("Caption Provider", &report.caption);

    println!();
    println!(
        "{} Overall: {}",
        symbol(&report.overall),
        report.overall.to_uppercase()
    );

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: review-guard batch --input reviews.jsonl --output results.json");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    println!("{} {}: {}", symbol(&result.status), name, result.message);
}

fn symbol(status: &str) -> &'static str {
    match status {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    }
}
