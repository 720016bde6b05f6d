//! Stub classifier for testing and offline mode

use async_trait::async_trait;
use review_guard_domain::prompt::{CAPTION_FIELD, TEXT_FIELD};
use review_guard_domain::{Classifier, ClassifyError, Label, Prompt, Verdict};

const AD_MARKERS: &[&str] = &[
    "http://",
    "https://",
    "www.",
    ".com",
    "discount",
    "promo code",
    "coupon",
    "use code",
    "call now",
];

const NO_VISIT_MARKERS: &[&str] = &[
    "never been",
    "never visited",
    "haven't been",
    "have not been",
    "heard it's",
    "heard it is",
    "heard that",
];

const IMAGE_AD_MARKERS: &[&str] = &[
    "advertisement",
    "flyer",
    "coupon",
    "discount",
    "promotion",
    "poster",
    "banner",
];

enum Mode {
    Heuristic,
    Fixed(Verdict),
    Fail(ClassifyError),
}

/// Stub classifier that returns configurable responses
pub struct StubClassifier {
    mode: Mode,
}

impl StubClassifier {
    /// Keyword heuristic over the review text and caption
    pub fn heuristic() -> Self {
        Self {
            mode: Mode::Heuristic,
        }
    }

    /// Create a stub that returns a specific verdict
    pub fn with_verdict(verdict: Verdict) -> Self {
        Self {
            mode: Mode::Fixed(verdict),
        }
    }

    /// Create a stub that always returns an error
    pub fn with_error(error: ClassifyError) -> Self {
        Self {
            mode: Mode::Fail(error),
        }
    }

    fn judge(prompt: &Prompt) -> Verdict {
        let data = prompt.data_section();
        let text = data
            .split_once(TEXT_FIELD)
            .map(|(_, text)| text.trim_end_matches('\n'))
            .unwrap_or_default()
            .to_lowercase();
        let caption = data
            .lines()
            .find_map(|line| line.strip_prefix(CAPTION_FIELD))
            .map(str::to_lowercase);

        let hits = |markers: &[&str], haystack: &str| -> Vec<String> {
            markers
                .iter()
                .filter(|m| haystack.contains(*m))
                .map(|m| m.to_string())
                .collect()
        };

        let (label, indicators) = {
            let ads = hits(AD_MARKERS, &text);
            let no_visit = hits(NO_VISIT_MARKERS, &text);
            let image_ads = match (&caption, prompt.allows_image_labels) {
                (Some(caption), true) => hits(IMAGE_AD_MARKERS, caption),
                _ => Vec::new(),
            };

            if !ads.is_empty() {
                (Label::Advertisement, ads)
            } else if !no_visit.is_empty() {
                (Label::RantNoVisit, no_visit)
            } else if !image_ads.is_empty() {
                (Label::ImageAdvertisement, image_ads)
            } else {
                (Label::Ok, Vec::new())
            }
        };

        let confidence = if label == Label::Ok { 0.6 } else { 0.9 };
        let relevant = !matches!(label, Label::Advertisement | Label::RantNoVisit);
        let rationale = format!("Stub: {} by keyword match", label);
        let raw_response = serde_json::json!({
            "label": label,
            "confidence": confidence,
            "relevant": relevant,
            "rationale": rationale,
            "indicators": indicators,
        })
        .to_string();

        Verdict {
            label,
            confidence: Some(confidence),
            relevant: Some(relevant),
            rationale: Some(rationale),
            indicators,
            raw_response,
        }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::heuristic()
    }
}

fn replay(error: &ClassifyError) -> ClassifyError {
    match error {
        ClassifyError::Network(msg) => ClassifyError::Network(msg.clone()),
        ClassifyError::Timeout => ClassifyError::Timeout,
        ClassifyError::RateLimited => ClassifyError::RateLimited,
        ClassifyError::Api { status, body } => ClassifyError::Api {
            status: *status,
            body: body.clone(),
        },
        ClassifyError::SchemaViolation(msg) => ClassifyError::SchemaViolation(msg.clone()),
        ClassifyError::Config(msg) => ClassifyError::Config(msg.clone()),
        ClassifyError::Exhausted { attempts, last } => ClassifyError::Exhausted {
            attempts: *attempts,
            last: Box::new(replay(last)),
        },
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        match &self.mode {
            Mode::Fail(error) => Err(replay(error)),
            Mode::Fixed(verdict) => Ok(verdict.clone()),
            Mode::Heuristic => Ok(Self::judge(prompt)),
        }
    }
}
