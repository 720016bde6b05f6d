//! review-guard domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Reviews, captions, labels, verdicts and batch results
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `prompt`: Deterministic prompt construction
//! - `usecases`: Classification with retries and the batch runner

pub mod model;
pub mod ports;
pub mod prompt;
pub mod usecases;

pub use model::*;
pub use ports::*;
pub use prompt::{Prompt, PromptBuilder, PromptConfig};
