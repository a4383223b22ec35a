//! External service providers
//!
//! The recommendation pipeline talks to two outside services: an image-labeling service that
//! tells us what is in an ingredient photo, and a language-model completion service that picks
//! the final recipes. Both sit behind traits so handlers and tests can swap implementations.
use serde::Serialize;

use crate::{error::AppResult, models::LabelAnnotation};

pub mod openai;
pub mod vision;

pub use openai::OpenAiProvider;
pub use vision::VisionLabelDetector;

/// A single prompt sent to the completion service
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    /// Instructions for the model
    pub system: String,
    /// User preferences and candidate recipes
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for language-model completion providers
///
/// Implementations return the raw text of the model's reply. Transport failures map to
/// `AppError::ServiceUnavailable`; a recognized rate-limit response maps to
/// `AppError::RateLimited` so callers can degrade instead of failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Trait for image label detection providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LabelDetector: Send + Sync {
    /// Detects labels in an encoded image (JPEG, PNG, ...)
    ///
    /// Labels are returned in the provider's order; callers apply their own confidence filter.
    async fn detect_labels(&self, image: &[u8]) -> AppResult<Vec<LabelAnnotation>>;

    fn name(&self) -> &'static str;
}
