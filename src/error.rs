use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The recipe corpus produced an empty shortlist, so there is nothing to recommend
    #[error("No candidate recipes")]
    NoCandidates,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The completion service answered, but not with the structured reply we asked for
    #[error("Malformed completion reply: {0}")]
    MalformedReply(String),

    #[error("Insufficient recommendations: {0}")]
    InsufficientRecommendations(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unmapped label: {0}")]
    UnmappedLabel(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the recommendation pipeline may recover from this error with the shortlist fallback
    pub fn is_recoverable_by_fallback(&self) -> bool {
        matches!(
            self,
            AppError::MalformedReply(_)
                | AppError::InsufficientRecommendations(_)
                | AppError::RateLimited(_)
        )
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::NoCandidates => (
                StatusCode::NOT_FOUND,
                "No matching recipes were found".to_string(),
            ),
            AppError::UnmappedLabel(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The ingredient in the photo could not be recognized".to_string(),
            ),
            AppError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "The request took too long to process".to_string(),
            ),
            AppError::ServiceUnavailable(_)
            | AppError::HttpClient(_)
            | AppError::RateLimited(_) => (
                StatusCode::BAD_GATEWAY,
                "An upstream service is unavailable".to_string(),
            ),
            AppError::MalformedReply(_)
            | AppError::InsufficientRecommendations(_)
            | AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_recoverable_kinds() {
        assert!(AppError::MalformedReply("x".into()).is_recoverable_by_fallback());
        assert!(AppError::InsufficientRecommendations("x".into()).is_recoverable_by_fallback());
        assert!(AppError::RateLimited("x".into()).is_recoverable_by_fallback());
        assert!(!AppError::ServiceUnavailable("x".into()).is_recoverable_by_fallback());
        assert!(!AppError::NoCandidates.is_recoverable_by_fallback());
        assert!(!AppError::Internal("x".into()).is_recoverable_by_fallback());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidInput("no ingredients".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NoCandidates.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UnmappedLabel("rock".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Timeout("detect".into()).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::ServiceUnavailable("openai".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let (_, message) =
            AppError::Internal("connection string postgres://secret".into()).status_and_message();
        assert!(!message.contains("secret"));

        let (_, message) =
            AppError::ServiceUnavailable("api key sk-123 rejected".into()).status_and_message();
        assert!(!message.contains("sk-123"));
    }
}
