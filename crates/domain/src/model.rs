//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Reference to the image attached to a review
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ImageRef {
    /// Local file path
    Path(PathBuf),
    /// Remote http(s) URL, downloaded before captioning
    Url(String),
    /// Raw image bytes already in memory
    Bytes(Vec<u8>),
}

impl ImageRef {
    /// Short human-readable description for logs (never the raw bytes)
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Path(path) => path.display().to_string(),
            ImageRef::Url(url) => url.clone(),
            ImageRef::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageRef::Url(trimmed.to_string())
        } else {
            ImageRef::Path(PathBuf::from(trimmed))
        }
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        ImageRef::from(value.to_string())
    }
}

/// A review submitted for classification
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    /// Dataset-unique identifier
    pub id: String,
    /// Review body as written by the user
    pub text: String,
    /// Attached photo, if any
    #[serde(default)]
    pub image: Option<ImageRef>,
    /// Name of the reviewed place
    #[serde(default)]
    pub place_name: Option<String>,
    /// Business category of the place (e.g. "Pizza restaurant")
    #[serde(default)]
    pub place_category: Option<String>,
    /// Star rating given by the reviewer
    #[serde(default, alias = "rank")]
    pub rating: Option<f64>,
}

impl Review {
    /// Create a text-only review without place metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            image: None,
            place_name: None,
            place_category: None,
            rating: None,
        }
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_place(
        mut self,
        name: Option<String>,
        category: Option<String>,
        rating: Option<f64>,
    ) -> Self {
        self.place_name = name;
        self.place_category = category;
        self.rating = rating;
        self
    }
}

/// Auto-generated description of a review image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caption(String);

impl Caption {
    pub const ELLIPSIS: char = '…';

    /// Normalize a raw model caption: trim whitespace and cap the length in chars
    pub fn new(raw: &str, max_chars: usize) -> Self {
        let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.chars().count() > max_chars {
            let mut truncated: String = cleaned.chars().take(max_chars).collect();
            truncated.push(Self::ELLIPSIS);
            Self(truncated)
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of labels the classifier may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Ok,
    Advertisement,
    Irrelevant,
    RantNoVisit,
    ImageAdvertisement,
    ImageIrrelevant,
}

impl Label {
    pub const ALL: [Label; 6] = [
        Label::Ok,
        Label::Advertisement,
        Label::Irrelevant,
        Label::RantNoVisit,
        Label::ImageAdvertisement,
        Label::ImageIrrelevant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ok => "ok",
            Label::Advertisement => "advertisement",
            Label::Irrelevant => "irrelevant",
            Label::RantNoVisit => "rant_no_visit",
            Label::ImageAdvertisement => "image_advertisement",
            Label::ImageIrrelevant => "image_irrelevant",
        }
    }

    /// Labels that only make sense when the review carries an image
    pub fn is_image_label(&self) -> bool {
        matches!(self, Label::ImageAdvertisement | Label::ImageIrrelevant)
    }

    /// Whether the label marks the review as low quality
    pub fn is_violation(&self) -> bool {
        !matches!(self, Label::Ok)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not in the closed label set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Structured classification outcome for one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Model-reported confidence in 0.0-1.0
    pub confidence: Option<f64>,
    /// Whether the model judged the review to be about the place
    pub relevant: Option<bool>,
    /// Short free-text justification
    pub rationale: Option<String>,
    /// Tokens or phrases the model flagged
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Unparsed model output, kept for audit
    pub raw_response: String,
}

/// Lifecycle of a single review inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Captioning,
    Prompted,
    Classified,
    Failed,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Classified | ReviewState::Failed)
    }
}

/// One line of batch output, rejoinable to the source dataset by `review_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub review_id: String,
    pub state: ReviewState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
    /// Set when captioning failed but the review fell back to text-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Classification attempts made (0 if the review never reached the model)
    pub attempts: u32,
}

impl BatchEntry {
    /// A fresh entry for a review that has not been processed yet
    pub fn pending(review_id: impl Into<String>) -> Self {
        Self {
            review_id: review_id.into(),
            state: ReviewState::Pending,
            label: None,
            confidence: None,
            relevant: None,
            rationale: None,
            indicators: Vec::new(),
            caption: None,
            caption_error: None,
            prompt_sha256: None,
            raw_response: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn classify_as(&mut self, verdict: Verdict, attempts: u32) {
        self.state = ReviewState::Classified;
        self.label = Some(verdict.label);
        self.confidence = verdict.confidence;
        self.relevant = verdict.relevant;
        self.rationale = verdict.rationale;
        self.indicators = verdict.indicators;
        self.raw_response = Some(verdict.raw_response);
        self.attempts = attempts;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = ReviewState::Failed;
        self.error = Some(error.into());
    }

    pub fn is_failed(&self) -> bool {
        self.state == ReviewState::Failed
    }
}

/// Full result of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub total: usize,
    pub classified: usize,
    pub failed: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn new(
        run_id: Uuid,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
        entries: Vec<BatchEntry>,
    ) -> Self {
        let failed = entries.iter().filter(|e| e.is_failed()).count();
        Self {
            run_id,
            started_at,
            finished_at,
            total: entries.len(),
            classified: entries.len() - failed,
            failed,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trips_through_str() {
        for label in Label::ALL {
            assert_eq!(label.as_str().parse::<Label>().unwrap(), label);
        }
        assert!("spam".parse::<Label>().is_err());
        assert!("OK".parse::<Label>().is_err());
    }

    #[test]
    fn test_image_ref_from_string() {
        assert_eq!(
            ImageRef::from("https://example.com/a.jpg"),
            ImageRef::Url("https://example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageRef::from("image/img_0.jpg"),
            ImageRef::Path(PathBuf::from("image/img_0.jpg"))
        );
    }

    #[test]
    fn test_caption_truncates_by_chars() {
        let caption = Caption::new("  a   photo of\na pizza  ", 300);
        assert_eq!(caption.as_str(), "a photo of a pizza");

        let long = Caption::new(&"é".repeat(10), 4);
        assert_eq!(long.as_str(), "éééé…");
    }

    #[test]
    fn test_review_accepts_rank_alias() {
        let review: Review = serde_json::from_str(
            r#"{"id":"1","text":"Nice","rank":4,"image":"photos/1.jpg"}"#,
        )
        .unwrap();
        assert_eq!(review.rating, Some(4.0));
        assert_eq!(
            review.image,
            Some(ImageRef::Path(PathBuf::from("photos/1.jpg")))
        );
    }

    #[test]
    fn test_report_counts() {
        let mut ok = BatchEntry::pending("1");
        ok.state = ReviewState::Classified;
        let mut bad = BatchEntry::pending("2");
        bad.fail("boom");

        let now = OffsetDateTime::now_utc();
        let report = BatchReport::new(Uuid::new_v4(), now, now, vec![ok, bad]);
        assert_eq!(report.total, 2);
        assert_eq!(report.classified, 1);
        assert_eq!(report.failed, 1);
    }
}
