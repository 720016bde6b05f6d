//! Classification use case: one prompt in, one validated verdict out

use std::time::Duration;

use crate::{
    model::Verdict,
    ports::{Classifier, ClassifyError},
    prompt::Prompt,
};

/// Retry behaviour for transient classification failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before `attempt` (1-based); zero for the first attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(2)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(800),
        }
    }
}

/// A verdict plus the number of attempts it took
#[derive(Debug, Clone)]
pub struct Classification {
    pub verdict: Verdict,
    pub attempts: u32,
}

/// Use case wrapping a single-attempt classifier with validation and retries
pub struct ClassifyUseCase<C> {
    classifier: C,
    retry: RetryPolicy,
}

impl<C: Classifier> ClassifyUseCase<C> {
    pub fn new(classifier: C, retry: RetryPolicy) -> Self {
        Self { classifier, retry }
    }

    /// Classify a prompt, retrying transient failures.
    ///
    /// Every failure is returned as [`ClassifyError::Exhausted`] carrying the
    /// attempt count and the last underlying error.
    pub async fn classify(&self, prompt: &Prompt) -> Result<Classification, ClassifyError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying classification");
                tokio::time::sleep(delay).await;
            }

            let error = match self.classifier.classify(prompt).await {
                Ok(verdict) => match check_label_offered(prompt, verdict) {
                    Ok(verdict) => {
                        tracing::debug!(attempt, label = %verdict.label, "Classification succeeded");
                        return Ok(Classification {
                            verdict,
                            attempts: attempt,
                        });
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            let transient = error.is_transient();
            tracing::warn!(attempt, transient, error = %error, "Classification attempt failed");

            if !transient || attempt >= max_attempts {
                return Err(ClassifyError::Exhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
        }
    }
}

/// Reject image labels when the prompt never offered them
fn check_label_offered(prompt: &Prompt, verdict: Verdict) -> Result<Verdict, ClassifyError> {
    if verdict.label.is_image_label() && !prompt.allows_image_labels {
        return Err(ClassifyError::SchemaViolation(format!(
            "label '{}' requires an image but the review has no caption",
            verdict.label
        )));
    }
    Ok(verdict)
}
