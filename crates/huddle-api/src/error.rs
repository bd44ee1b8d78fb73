use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use tracing::error;

use huddle_types::api::ErrorBody;

/// Failure of a single handler invocation. Nothing is retried; every variant
/// is terminal and user-visible except `Storage`, whose detail is only logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No resolvable identity.
    #[error("Unauthorized")]
    Unauthenticated,

    /// Identity resolved but lacks the role, membership or authorship required.
    #[error("{0}")]
    Forbidden(&'static str),

    /// Referenced entity is missing or lives in another workspace.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A rule of the data model would be broken, or an argument is unusable.
    #[error("{0}")]
    Invalid(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Upload exceeds the size limit")]
    TooLarge,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Storage(e) => {
                error!("Storage error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
