//! Batch command - classify a whole review dataset

use anyhow::{Context, Result};
use review_guard_adapters::{dataset::FsReviewSource, results::FsResultSink};
use review_guard_domain::usecases::BatchRunner;
use review_guard_domain::{Classifier, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::BatchArgs;
use crate::commands::classify::{
    batch_config, build_captioner, build_classifier, ensure_reachable,
};
use crate::config::AppConfig;

pub async fn execute(args: BatchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let format = args.format.unwrap_or(config.batch.output_format);
    let mut batch = batch_config(&config);
    if let Some(max_concurrent) = args.max_concurrent {
        batch.max_concurrent = max_concurrent;
    }

    // Everything fatal is checked before the first review is classified
    let source = FsReviewSource::new(&args.input)
        .with_context(|| format!("Failed to open dataset: {}", args.input.display()))?;
    let sink = FsResultSink::new(args.output.clone(), format);
    let classifier: Arc<dyn Classifier> = Arc::from(build_classifier(&config)?);
    let captioner = build_captioner(&config)?;
    ensure_reachable(classifier.as_ref(), &config).await?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        format = %format,
        provider = %config.llm.provider,
        caption_provider = %config.caption.provider,
        max_concurrent = batch.max_concurrent,
        "Starting batch classification"
    );

    let runner = BatchRunner::new(classifier, captioner, Arc::new(SystemClock), batch);
    let report = runner
        .execute(&source, &sink)
        .await
        .context("Batch run failed")?;

    println!(
        "Processed {} reviews: {} classified, {} failed",
        report.total, report.classified, report.failed
    );
    for entry in report.entries.iter().filter(|e| e.is_failed()) {
        println!(
            "  ✗ {}: {}",
            entry.review_id,
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Results written to {}", sink.path().display());

    Ok(())
}
