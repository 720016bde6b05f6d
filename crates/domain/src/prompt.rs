//! Prompt construction for review moderation
//!
//! The builder is pure: the same review and caption always yield the same
//! prompt, byte for byte.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{Caption, Label, Review};

/// Header that opens the data section; everything after it describes the review
pub const DATA_SECTION_HEADER: &str = "## Review Data\n";

/// Line prefix for the review text inside the data section
pub const TEXT_FIELD: &str = "Review Text: ";

/// Line prefix for the image caption inside the data section
pub const CAPTION_FIELD: &str = "Image Caption: ";

const SYSTEM_INSTRUCTION: &str = "You are a strict review moderation classifier. \
Return STRICT JSON only (double-quoted keys and strings). \
Booleans must be lowercase true/false. No extra text.";

/// A fully formed instruction payload for the remote classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    /// System instruction
    pub system: String,
    /// Single user message carrying task, schema and data
    pub user: String,
    /// Whether the image labels were offered to the model
    pub allows_image_labels: bool,
}

impl Prompt {
    /// SHA-256 of the prompt, hex encoded; stable across runs for identical input
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// The data section of the user message (review text, caption, metadata)
    pub fn data_section(&self) -> &str {
        self.user
            .split_once(DATA_SECTION_HEADER)
            .map(|(_, data)| data)
            .unwrap_or_default()
    }
}

/// Configuration for prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    /// Cap on review text length in chars (None = embed verbatim)
    pub max_review_chars: Option<usize>,
}

/// Builds classification prompts from reviews
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Build the prompt for a review and its optional caption
    pub fn build(&self, review: &Review, caption: Option<&Caption>) -> Prompt {
        let labels = allowed_labels(caption.is_some());
        let label_set = labels
            .iter()
            .map(|l| format!("\"{}\"", l.as_str()))
            .collect::<Vec<_>>()
            .join("|");

        let mut prompt = String::new();

        prompt.push_str(
            "Task: Classify a location review for relevance and policy violations.\n\n",
        );

        prompt.push_str("## Definitions (pick exactly one label)\n");
        for label in &labels {
            prompt.push_str(&format!("- {}: {}\n", label.as_str(), definition(*label)));
        }
        prompt.push('\n');

        prompt.push_str(
            "If none of the violation categories apply and the review is about the place, \
classify as \"ok\". Default to \"ok\" when in doubt: the goal is to increase user trust, \
ensure fair business representation and keep the platform credible.\n\n",
        );

        if caption.is_some() {
            prompt.push_str(
                "The image caption was generated automatically from the photo attached to \
the review. It is not written by the reviewer.\n\n",
            );
        }

        prompt.push_str("## Output Format\n");
        prompt.push_str("Respond with ONLY a JSON object matching this exact schema:\n");
        prompt.push_str("{\n");
        prompt.push_str(&format!("  \"label\": {},\n", label_set));
        prompt.push_str("  \"confidence\": 0.0 to 1.0,\n");
        prompt.push_str("  \"relevant\": true|false,\n");
        prompt.push_str("  \"rationale\": \"<short phrase>\",\n");
        prompt.push_str("  \"indicators\": [\"token1\", \"token2\"]\n");
        prompt.push_str("}\n\n");
        prompt.push_str("Rules:\n");
        prompt.push_str("- \"label\" must be exactly one string from the list above\n");
        prompt.push_str("- Indicators must be short quotes from the review or caption\n\n");

        prompt.push_str(DATA_SECTION_HEADER);
        prompt.push_str(&format!(
            "Place Name: {}\n",
            review.place_name.as_deref().unwrap_or_default()
        ));
        prompt.push_str(&format!(
            "Place Category: {}\n",
            review.place_category.as_deref().unwrap_or_default()
        ));
        prompt.push_str(&format!(
            "Rating: {}\n",
            review.rating.map(|r| r.to_string()).unwrap_or_default()
        ));
        if let Some(caption) = caption {
            prompt.push_str(CAPTION_FIELD);
            prompt.push_str(caption.as_str());
            prompt.push('\n');
        }
        prompt.push_str(TEXT_FIELD);
        prompt.push_str(&self.review_text(&review.text));
        prompt.push('\n');

        Prompt {
            system: SYSTEM_INSTRUCTION.to_string(),
            user: prompt,
            allows_image_labels: caption.is_some(),
        }
    }

    fn review_text(&self, text: &str) -> String {
        match self.config.max_review_chars {
            Some(max) if text.chars().count() > max => {
                let mut truncated: String = text.chars().take(max).collect();
                truncated.push(Caption::ELLIPSIS);
                truncated
            }
            _ => text.to_string(),
        }
    }
}

/// Labels offered to the model; image labels only when a caption exists
fn allowed_labels(has_caption: bool) -> Vec<Label> {
    Label::ALL
        .into_iter()
        .filter(|label| has_caption || !label.is_image_label())
        .collect()
}

fn definition(label: Label) -> &'static str {
    match label {
        Label::Advertisement => {
            "contains promotional links or codes, phone numbers, coupons, \"call now\", \
or unrelated marketing."
        }
        Label::Irrelevant => {
            "off-topic; not about this place or its services; about another product, \
person or event; clearly written for a different business type; filler or emoji-only."
        }
        Label::RantNoVisit => {
            "the reviewer clearly states they did not visit (e.g. \"never been\", \
\"haven't been\", \"heard it's...\")."
        }
        Label::ImageAdvertisement => {
            "the attached image is promotional material (flyer, banner, product ad, \
logo with contact details) rather than a photo of the visit."
        }
        Label::ImageIrrelevant => {
            "the attached image has nothing to do with this place (unrelated object, \
screenshot, meme, different business)."
        }
        Label::Ok => "none of the above AND the review is about this place.",
    }
}
