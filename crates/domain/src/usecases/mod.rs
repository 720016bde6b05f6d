//! Application use cases / business logic

pub mod batch;
pub mod classify;

pub use batch::{BatchConfig, BatchError, BatchRunner, CaptionFailurePolicy};
pub use classify::{Classification, ClassifyUseCase, RetryPolicy};
