//! Batch runner - captions, prompts and classifies a dataset of reviews

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    model::{BatchEntry, BatchReport, Caption, Review, ReviewState},
    ports::{
        Captioner, Classifier, ClassifyError, Clock, ResultSink, ResultSinkError, ReviewSource,
        ReviewSourceError,
    },
    prompt::{PromptBuilder, PromptConfig},
    usecases::classify::{ClassifyUseCase, RetryPolicy},
};

/// What to do with a review whose image cannot be captioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionFailurePolicy {
    /// Classify on text alone and record the caption error
    #[default]
    TextOnly,
    /// Mark the review failed
    Fail,
}

impl FromStr for CaptionFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text_only" => Ok(Self::TextOnly),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "Unknown caption failure policy '{}' (expected text_only or fail)",
                other
            )),
        }
    }
}

/// Configuration for the batch runner
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Reviews processed concurrently
    pub max_concurrent: usize,
    /// Caption failure handling
    pub caption_failure: CaptionFailurePolicy,
    /// Wall-clock limit for the whole batch (None = unlimited)
    pub timeout: Option<Duration>,
    /// Retry policy for each classification
    pub retry: RetryPolicy,
    /// Prompt construction settings
    pub prompt: PromptConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            caption_failure: CaptionFailurePolicy::default(),
            timeout: None,
            retry: RetryPolicy::default(),
            prompt: PromptConfig::default(),
        }
    }
}

/// Errors that abort a whole batch
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Output is not writable: {0}")]
    Output(ResultSinkError),
    #[error("Failed to load reviews: {0}")]
    Source(#[from] ReviewSourceError),
    #[error("Failed to persist results: {0}")]
    Sink(#[from] ResultSinkError),
}

/// Batch orchestrator
pub struct BatchRunner<C, P, Cl>
where
    C: Classifier + ?Sized,
    P: Captioner + ?Sized,
    Cl: Clock + ?Sized,
{
    classify: ClassifyUseCase<Arc<C>>,
    captioner: Arc<P>,
    clock: Arc<Cl>,
    prompt_builder: PromptBuilder,
    config: BatchConfig,
}

impl<C, P, Cl> BatchRunner<C, P, Cl>
where
    C: Classifier + ?Sized,
    P: Captioner + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(classifier: Arc<C>, captioner: Arc<P>, clock: Arc<Cl>, config: BatchConfig) -> Self {
        Self {
            classify: ClassifyUseCase::new(classifier, config.retry),
            captioner,
            clock,
            prompt_builder: PromptBuilder::new(config.prompt.clone()),
            config,
        }
    }

    /// Load reviews, run the batch and persist the report.
    ///
    /// The sink is prepared first so an unwritable output fails the run
    /// before any review reaches the classifier.
    pub async fn execute(
        &self,
        source: &dyn ReviewSource,
        sink: &dyn ResultSink,
    ) -> Result<BatchReport, BatchError> {
        sink.prepare().await.map_err(BatchError::Output)?;
        let reviews = source.load().await?;
        let report = self.run(reviews).await;
        sink.persist(&report).await?;
        Ok(report)
    }

    /// Process every review; the report has one entry per review, in input order
    pub async fn run(&self, reviews: Vec<Review>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = self.clock.now();

        tracing::info!(
            run_id = %run_id,
            reviews = reviews.len(),
            max_concurrent = self.config.max_concurrent,
            "Starting batch"
        );

        let mut slots: Vec<Option<BatchEntry>> = vec![None; reviews.len()];

        let timed_out = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drive(&reviews, &mut slots))
                .await
                .is_err(),
            None => {
                self.drive(&reviews, &mut slots).await;
                false
            }
        };

        if timed_out {
            tracing::error!(run_id = %run_id, "Batch timeout elapsed, unfinished reviews marked failed");
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .zip(&reviews)
            .map(|(slot, review)| {
                slot.unwrap_or_else(|| {
                    let mut entry = BatchEntry::pending(&review.id);
                    entry.fail("Batch timeout elapsed before the review finished");
                    entry
                })
            })
            .collect();

        let report = BatchReport::new(run_id, started_at, self.clock.now(), entries);

        tracing::info!(
            run_id = %run_id,
            total = report.total,
            classified = report.classified,
            failed = report.failed,
            "Batch finished"
        );

        report
    }

    /// Run reviews through a bounded window, writing each entry to its input slot
    async fn drive(&self, reviews: &[Review], slots: &mut [Option<BatchEntry>]) {
        let max_concurrent = self.config.max_concurrent.max(1);
        let mut pending = reviews.iter().enumerate();
        let mut tasks = FuturesUnordered::new();

        loop {
            while tasks.len() < max_concurrent {
                let Some((index, review)) = pending.next() else {
                    break;
                };
                tasks.push(async move { (index, self.process_review(review).await) });
            }

            let Some((index, entry)) = tasks.next().await else {
                break;
            };
            slots[index] = Some(entry);
        }
    }

    /// Caption (if needed), prompt and classify one review.
    ///
    /// Never fails: any problem is recorded on the returned entry.
    pub async fn process_review(&self, review: &Review) -> BatchEntry {
        let mut entry = BatchEntry::pending(&review.id);

        let caption = match self.caption_review(review, &mut entry).await {
            Ok(caption) => caption,
            Err(reason) => {
                entry.fail(reason);
                return entry;
            }
        };

        if review.text.trim().is_empty() && caption.is_none() {
            tracing::warn!(review_id = %review.id, "Nothing to classify");
            entry.fail("Empty review text and no image caption");
            return entry;
        }

        let prompt = self.prompt_builder.build(review, caption.as_ref());
        entry.caption = caption;
        entry.state = ReviewState::Prompted;
        entry.prompt_sha256 = Some(prompt.fingerprint());

        match self.classify.classify(&prompt).await {
            Ok(classification) => {
                tracing::info!(
                    review_id = %review.id,
                    label = %classification.verdict.label,
                    confidence = ?classification.verdict.confidence,
                    attempts = classification.attempts,
                    "Classified review"
                );
                entry.classify_as(classification.verdict, classification.attempts);
            }
            Err(error) => {
                tracing::error!(review_id = %review.id, error = %error, "Classification failed");
                entry.attempts = match &error {
                    ClassifyError::Exhausted { attempts, .. } => *attempts,
                    _ => 1,
                };
                entry.fail(error.to_string());
            }
        }

        entry
    }

    /// Returns the caption to use, or the failure reason when the policy is `fail`
    async fn caption_review(
        &self,
        review: &Review,
        entry: &mut BatchEntry,
    ) -> Result<Option<Caption>, String> {
        let Some(image) = &review.image else {
            return Ok(None);
        };

        entry.state = ReviewState::Captioning;

        match self.captioner.caption(image).await {
            Ok(caption) => {
                tracing::debug!(review_id = %review.id, caption = %caption, "Captioned image");
                Ok(Some(caption))
            }
            Err(error) => {
                tracing::warn!(
                    review_id = %review.id,
                    image = %image.describe(),
                    error = %error,
                    policy = ?self.config.caption_failure,
                    "Captioning failed"
                );
                match self.config.caption_failure {
                    CaptionFailurePolicy::TextOnly => {
                        entry.caption_error = Some(error.to_string());
                        Ok(None)
                    }
                    CaptionFailurePolicy::Fail => Err(format!("Captioning failed: {}", error)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageRef, Label, Verdict};
    use crate::ports::CaptionError;
    use crate::prompt::{Prompt, TEXT_FIELD};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    /// Fails every prompt whose review text contains `fail_marker`
    struct FakeClassifier {
        fail_marker: Option<String>,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl FakeClassifier {
        fn new(fail_marker: Option<&str>) -> Self {
            Self {
                fail_marker: fail_marker.map(String::from),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            let text = prompt
                .data_section()
                .split_once(TEXT_FIELD)
                .map(|(_, t)| t)
                .unwrap_or_default();
            if let Some(marker) = &self.fail_marker {
                if text.contains(marker.as_str()) {
                    return Err(ClassifyError::Network("connection reset".into()));
                }
            }
            Ok(Verdict {
                label: Label::Ok,
                confidence: Some(0.8),
                relevant: Some(true),
                rationale: Some("about the place".into()),
                indicators: vec![],
                raw_response: r#"{"label":"ok"}"#.into(),
            })
        }
    }

    /// Captions everything except raw bytes, which it treats as corrupt
    struct FakeCaptioner;

    #[async_trait]
    impl Captioner for FakeCaptioner {
        async fn caption(&self, image: &ImageRef) -> Result<Caption, CaptionError> {
            match image {
                ImageRef::Bytes(_) => Err(CaptionError::UnsupportedImage(
                    "not a recognised image format".into(),
                )),
                _ => Ok(Caption::new("a restaurant dining room", 300)),
            }
        }
    }

    struct FakeClock {
        time: OffsetDateTime,
    }

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            self.time
        }
    }

    fn runner(
        classifier: Arc<FakeClassifier>,
        config: BatchConfig,
    ) -> BatchRunner<FakeClassifier, FakeCaptioner, FakeClock> {
        BatchRunner::new(
            classifier,
            Arc::new(FakeCaptioner),
            Arc::new(FakeClock {
                time: OffsetDateTime::UNIX_EPOCH,
            }),
            config,
        )
    }

    fn fast_config() -> BatchConfig {
        BatchConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::ZERO,
            },
            ..Default::default()
        }
    }

    fn five_reviews() -> Vec<Review> {
        (1..=5)
            .map(|i| Review::new(i.to_string(), format!("review number {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_failure_at_item_three_keeps_all_entries_in_order() {
        let classifier = Arc::new(FakeClassifier::new(Some("review number 3")));
        let report = runner(classifier, fast_config()).run(five_reviews()).await;

        assert_eq!(report.total, 5);
        assert_eq!(report.entries.len(), 5);
        let ids: Vec<_> = report.entries.iter().map(|e| e.review_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        let third = &report.entries[2];
        assert_eq!(third.state, ReviewState::Failed);
        assert!(third.error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(third.attempts, 2);

        for (i, entry) in report.entries.iter().enumerate() {
            if i != 2 {
                assert_eq!(entry.state, ReviewState::Classified);
                assert_eq!(entry.label, Some(Label::Ok));
            }
        }
        assert_eq!(report.failed, 1);
        assert_eq!(report.classified, 4);
    }

    #[tokio::test]
    async fn test_order_preserved_with_serial_processing() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let config = BatchConfig {
            max_concurrent: 1,
            ..fast_config()
        };
        let report = runner(Arc::clone(&classifier), config)
            .run(five_reviews())
            .await;

        assert!(report.entries.iter().all(|e| e.state.is_terminal()));
        assert_eq!(classifier.prompts.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_corrupt_image_falls_back_to_text_only() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let review =
            Review::new("img", "Great ambience and service").with_image(ImageRef::Bytes(vec![0, 1, 2]));

        let entry = runner(Arc::clone(&classifier), fast_config())
            .process_review(&review)
            .await;

        assert_eq!(entry.state, ReviewState::Classified);
        assert!(entry.caption.is_none());
        assert!(entry.caption_error.as_deref().unwrap().contains("corrupt"));

        let prompts = classifier.prompts.lock().unwrap();
        assert!(!prompts[0].allows_image_labels);
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_review_under_fail_policy() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let config = BatchConfig {
            caption_failure: CaptionFailurePolicy::Fail,
            ..fast_config()
        };
        let review = Review::new("img", "Nice").with_image(ImageRef::Bytes(vec![0]));

        let entry = runner(Arc::clone(&classifier), config)
            .process_review(&review)
            .await;

        assert_eq!(entry.state, ReviewState::Failed);
        assert_eq!(entry.attempts, 0);
        assert!(entry.error.as_deref().unwrap().starts_with("Captioning failed"));
        assert!(classifier.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caption_is_embedded_before_classification() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let review = Review::new("img", "Great ambience and service")
            .with_image(ImageRef::from("interior.jpg"));

        let entry = runner(Arc::clone(&classifier), fast_config())
            .process_review(&review)
            .await;

        assert_eq!(
            entry.caption.as_ref().map(|c| c.as_str()),
            Some("a restaurant dining room")
        );
        let prompts = classifier.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("Image Caption: a restaurant dining room"));
        assert!(prompts[0].allows_image_labels);
        assert_eq!(entry.prompt_sha256, Some(prompts[0].fingerprint()));
    }

    /// Never answers within any reasonable batch timeout
    struct StalledClassifier;

    #[async_trait]
    impl Classifier for StalledClassifier {
        async fn classify(&self, _prompt: &Prompt) -> Result<Verdict, ClassifyError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(ClassifyError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_batch_timeout_marks_unfinished_reviews_failed() {
        let runner = BatchRunner::new(
            Arc::new(StalledClassifier),
            Arc::new(FakeCaptioner),
            Arc::new(FakeClock {
                time: OffsetDateTime::UNIX_EPOCH,
            }),
            BatchConfig {
                timeout: Some(Duration::from_millis(50)),
                ..fast_config()
            },
        );

        let report = runner.run(five_reviews()).await;

        assert_eq!(report.entries.len(), 5);
        assert_eq!(report.failed, 5);
        assert!(
            report.entries[0]
                .error
                .as_deref()
                .unwrap()
                .contains("timeout")
        );
    }

    /// Answers later reviews first: delay shrinks as the review number grows
    struct ReverseOrderClassifier {
        finished: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Classifier for ReverseOrderClassifier {
        async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
            let number: u64 = prompt
                .data_section()
                .split("review number ")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(100 * (6 - number))).await;
            self.finished.lock().unwrap().push(number.to_string());
            Ok(Verdict {
                label: Label::Ok,
                confidence: None,
                relevant: Some(true),
                rationale: None,
                indicators: vec![],
                raw_response: r#"{"label":"ok"}"#.into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completion_keeps_input_order() {
        let classifier = Arc::new(ReverseOrderClassifier {
            finished: Mutex::new(Vec::new()),
        });
        let runner = BatchRunner::new(
            Arc::clone(&classifier),
            Arc::new(FakeCaptioner),
            Arc::new(FakeClock {
                time: OffsetDateTime::UNIX_EPOCH,
            }),
            BatchConfig {
                max_concurrent: 5,
                ..fast_config()
            },
        );

        let report = runner.run(five_reviews()).await;

        assert_eq!(
            *classifier.finished.lock().unwrap(),
            vec!["5", "4", "3", "2", "1"]
        );
        let ids: Vec<_> = report.entries.iter().map(|e| e.review_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(report.classified, 5);
    }

    #[tokio::test]
    async fn test_blank_review_fails_alone_without_model_call() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let reviews = vec![
            Review::new("1", "Good food"),
            Review::new("2", "   "),
            Review::new("3", "Friendly staff"),
        ];

        let report = runner(Arc::clone(&classifier), fast_config())
            .run(reviews)
            .await;

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.classified, 2);
        let blank = &report.entries[1];
        assert_eq!(blank.state, ReviewState::Failed);
        assert_eq!(blank.attempts, 0);
        assert!(blank.error.as_deref().unwrap().contains("Empty review text"));
        assert_eq!(classifier.prompts.lock().unwrap().len(), 2);
    }

    struct VecSource(Vec<Review>);

    #[async_trait]
    impl ReviewSource for VecSource {
        async fn load(&self) -> Result<Vec<Review>, ReviewSourceError> {
            Ok(self.0.clone())
        }
    }

    /// Refuses to prepare, like an output path under a read-only directory
    struct UnwritableSink {
        persisted: Mutex<bool>,
    }

    #[async_trait]
    impl ResultSink for UnwritableSink {
        async fn prepare(&self) -> Result<(), ResultSinkError> {
            Err(ResultSinkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only directory",
            )))
        }

        async fn persist(&self, _report: &BatchReport) -> Result<(), ResultSinkError> {
            *self.persisted.lock().unwrap() = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unwritable_output_fails_before_classifying() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let sink = UnwritableSink {
            persisted: Mutex::new(false),
        };

        let result = runner(Arc::clone(&classifier), fast_config())
            .execute(&VecSource(five_reviews()), &sink)
            .await;

        assert!(matches!(result, Err(BatchError::Output(_))));
        assert!(classifier.prompts.lock().unwrap().is_empty());
        assert!(!*sink.persisted.lock().unwrap());
    }

    #[tokio::test]
    async fn test_empty_batch_yields_empty_report() {
        let classifier = Arc::new(FakeClassifier::new(None));
        let report = runner(classifier, fast_config()).run(vec![]).await;
        assert_eq!(report.total, 0);
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_caption_failure_policy_parses() {
        assert_eq!(
            "text_only".parse::<CaptionFailurePolicy>().unwrap(),
            CaptionFailurePolicy::TextOnly
        );
        assert_eq!(
            "fail".parse::<CaptionFailurePolicy>().unwrap(),
            CaptionFailurePolicy::Fail
        );
        assert!("skip".parse::<CaptionFailurePolicy>().is_err());
    }
}
