//! review-guard adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `llm`: LLM provider adapters (OpenAI-compatible/Groq, Anthropic, etc.)
//! - `caption`: Image captioning adapters
//! - `dataset`: Filesystem review datasets
//! - `results`: Filesystem batch result writer

mod dataset_fs;
mod results_fs;

pub mod caption;
pub mod llm;

/// Re-exports for dataset adapters
pub mod dataset {
    pub use crate::dataset_fs::FsReviewSource;
}

/// Re-exports for result adapters
pub mod results {
    pub use crate::results_fs::{FsResultSink, OutputFormat};
}
