use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Handler error, rendered as `{"error": ..., "status": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Model not loaded. Please train the model first.")]
    ModelNotLoaded,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::Internal(msg) => msg.clone(),
            Self::ModelNotLoaded => self.to_string(),
        };

        let body = axum::Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AppError::BadRequest("text is empty".into()).to_string(), "Bad request: text is empty");
        assert_eq!(AppError::ModelNotLoaded.to_string(), "Model not loaded. Please train the model first.");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::ModelNotLoaded.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
