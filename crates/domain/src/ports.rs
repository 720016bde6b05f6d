//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{BatchReport, Caption, ImageRef, Review, Verdict};
use crate::prompt::Prompt;

/// Error type for captioning operations (a captioning failure)
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Image not found: {0}")]
    NotFound(String),
    #[error("Unsupported or corrupt image: {0}")]
    UnsupportedImage(String),
    #[error("Failed to fetch image: {0}")]
    Fetch(String),
    #[error("Captioning model error: {0}")]
    Model(String),
    #[error("Captioning model returned an empty caption")]
    Empty,
    #[error("Captioning is disabled")]
    Disabled,
}

/// Port for turning an image into a short caption
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Caption a single image
    async fn caption(&self, image: &ImageRef) -> Result<Caption, CaptionError>;
}

/// Error type for classifier operations
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout")]
    Timeout,
    #[error("Rate limited")]
    RateLimited,
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Classification failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ClassifyError>,
    },
}

impl ClassifyError {
    /// Whether a retry of the same request can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifyError::Network(_)
            | ClassifyError::Timeout
            | ClassifyError::RateLimited
            | ClassifyError::SchemaViolation(_) => true,
            ClassifyError::Api { status, .. } => *status >= 500,
            ClassifyError::Config(_) | ClassifyError::Exhausted { .. } => false,
        }
    }
}

/// Port for LLM-based classification. One call is one attempt.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a fully built prompt
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError>;

    /// Startup check that the provider can be reached at all.
    ///
    /// Called once before any review is processed; an error here stops the run.
    async fn preflight(&self) -> Result<(), ClassifyError> {
        Ok(())
    }
}

#[async_trait]
impl<C: Classifier + ?Sized> Classifier for &C {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        (*self).classify(prompt).await
    }

    async fn preflight(&self) -> Result<(), ClassifyError> {
        (*self).preflight().await
    }
}

#[async_trait]
impl<C: Classifier + ?Sized> Classifier for std::sync::Arc<C> {
    async fn classify(&self, prompt: &Prompt) -> Result<Verdict, ClassifyError> {
        self.as_ref().classify(prompt).await
    }

    async fn preflight(&self) -> Result<(), ClassifyError> {
        self.as_ref().preflight().await
    }
}

/// Error type for review datasets
#[derive(Debug, Error)]
pub enum ReviewSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("Duplicate review id '{id}'")]
    DuplicateId { id: String },
}

/// Port for loading the reviews of a batch
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Load all reviews in dataset order
    async fn load(&self) -> Result<Vec<Review>, ReviewSourceError>;
}

/// Error type for persisting batch results
#[derive(Debug, Error)]
pub enum ResultSinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Port for persisting a finished batch
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Make sure results can be written; called before any review is processed
    async fn prepare(&self) -> Result<(), ResultSinkError> {
        Ok(())
    }

    async fn persist(&self, report: &BatchReport) -> Result<(), ResultSinkError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
