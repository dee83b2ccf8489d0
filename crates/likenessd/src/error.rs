use crate::engine::EngineError;
use crate::storage::UploadError;
use crate::validate::ValidationError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use likeness_core::AnalyzerError;
use likeness_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// API-level errors. Every variant maps to one HTTP status and a stable
/// `error_type` discriminator in the JSON body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Processing(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) | ApiError::Forbidden(_) => "auth_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Processing(_) => "processing_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!(error = ?err, "internal API error");
        }
        let body = json!({
            "error": self.to_string(),
            "error_type": self.error_type(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(io) => ApiError::Internal(io.into()),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Analyzer(
                inner @ (AnalyzerError::NoFaceDetected
                | AnalyzerError::UndecodableImage
                | AnalyzerError::BadEmbedding { .. }),
            ) => ApiError::Processing(inner.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(_: MultipartError) -> Self {
        ApiError::Validation("invalid multipart request body".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_no_face_maps_to_processing() {
        let err: ApiError = EngineError::Analyzer(AnalyzerError::NoFaceDetected).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_type(), "processing_error");
    }

    #[test]
    fn engine_channel_closed_is_internal() {
        let err: ApiError = EngineError::ChannelClosed.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upload_validation_is_bad_request() {
        let err: ApiError = UploadError::Empty.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "validation_error");
    }
}
