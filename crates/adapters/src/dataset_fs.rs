//! Filesystem review datasets (JSON array or JSON Lines)

use async_trait::async_trait;
use review_guard_domain::{ImageRef, Review, ReviewSource, ReviewSourceError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Reads reviews from a local `.json` (array) or `.jsonl` file
pub struct FsReviewSource {
    path: PathBuf,
}

impl FsReviewSource {
    /// Create a new dataset reader; the file must exist
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ReviewSourceError> {
        let path = path.as_ref().to_path_buf();

        if !path.is_file() {
            return Err(ReviewSourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Dataset not found: {}", path.display()),
            )));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn parse_records(&self, content: &str) -> Result<Vec<(String, RawReview)>, ReviewSourceError> {
        if content.trim_start().starts_with('[') {
            let values: Vec<Value> =
                serde_json::from_str(content).map_err(|e| ReviewSourceError::Parse {
                    location: format!("{}:{}:{}", self.path.display(), e.line(), e.column()),
                    message: e.to_string(),
                })?;

            values
                .into_iter()
                .enumerate()
                .map(|(index, value)| -> Result<_, ReviewSourceError> {
                    let location = format!("{} element {}", self.path.display(), index + 1);
                    let raw: RawReview = serde_json::from_value(value).map_err(|e| {
                        ReviewSourceError::Parse {
                            location: location.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    Ok(((index + 1).to_string(), raw))
                })
                .collect()
        } else {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| -> Result<_, ReviewSourceError> {
                    let raw: RawReview = serde_json::from_str(line).map_err(|e| ReviewSourceError::Parse {
                        location: format!("{}:{}", self.path.display(), index + 1),
                        message: e.to_string(),
                    })?;
                    Ok(((index + 1).to_string(), raw))
                })
                .collect()
        }
    }

    /// The id written in the record, if any; blank strings count as missing
    fn explicit_id(
        &self,
        position: &str,
        raw: &RawReview,
    ) -> Result<Option<String>, ReviewSourceError> {
        match &raw.id {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) if id.trim().is_empty() => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(ReviewSourceError::Parse {
                location: format!("{} review {}", self.path.display(), position),
                message: format!("id must be a string or number, got {}", other),
            }),
        }
    }

    fn to_review(&self, id: String, raw: RawReview) -> Review {
        let image = raw
            .image
            .filter(|s| !s.trim().is_empty())
            .map(|s| match ImageRef::from(s) {
                ImageRef::Path(p) if p.is_relative() => ImageRef::Path(self.base_dir().join(p)),
                other => other,
            });

        Review {
            id,
            text: raw.text,
            image,
            place_name: raw.place_name,
            place_category: raw.place_category,
            rating: raw.rating,
        }
    }
}

/// Dataset record as found on disk; accepts the column names of exported
/// review spreadsheets alongside snake_case keys
#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "Text", alias = "review_text")]
    text: String,
    #[serde(default, alias = "image_path", alias = "image_url", alias = "photo")]
    image: Option<String>,
    #[serde(default, alias = "Place Name", alias = "place")]
    place_name: Option<String>,
    #[serde(default, alias = "Place Type", alias = "place_type", alias = "category")]
    place_category: Option<String>,
    #[serde(default, alias = "Rating", alias = "rank")]
    rating: Option<f64>,
}

#[async_trait]
impl ReviewSource for FsReviewSource {
    async fn load(&self) -> Result<Vec<Review>, ReviewSourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let records = self.parse_records(&content)?;

        // Explicit ids first, so a positional id never shadows one written later
        let mut taken = HashSet::new();
        let mut explicit = Vec::with_capacity(records.len());
        for (position, raw) in &records {
            let id = self.explicit_id(position, raw)?;
            if let Some(id) = &id {
                if !taken.insert(id.clone()) {
                    return Err(ReviewSourceError::DuplicateId { id: id.clone() });
                }
            }
            explicit.push(id);
        }

        let mut reviews = Vec::with_capacity(records.len());
        for ((position, raw), id) in records.into_iter().zip(explicit) {
            let id = match id {
                Some(id) => id,
                None => {
                    let mut id = position;
                    while taken.contains(&id) {
                        id.insert(0, '#');
                    }
                    taken.insert(id.clone());
                    id
                }
            };
            reviews.push(self.to_review(id, raw));
        }

        tracing::info!(
            path = %self.path.display(),
            count = reviews.len(),
            "Loaded reviews"
        );

        Ok(reviews)
    }
}
