//! API error types with `{success: false, error}` JSON responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::processor::ProcessingError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] ProcessingError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Pipeline(ProcessingError::NoFilesProvided) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Pipeline(ProcessingError::Extraction(
                ExtractionError::UnsupportedFormat { .. },
            )) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, self.to_string()),
            ApiError::Pipeline(ProcessingError::Extraction(other)) => {
                tracing::error!(error = %other, "Unexpected extraction error escaped the pipeline");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::PayloadTooLarge(detail) => (StatusCode::PAYLOAD_TOO_LARGE, detail.clone()),
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            tracing::warn!(error = %err, "Upload body exceeds the request limit");
            return ApiError::PayloadTooLarge("Request body exceeds the upload limit".into());
        }
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn no_files_returns_400() {
        let response = ApiError::from(ProcessingError::NoFilesProvided).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No prescription images uploaded");
    }

    #[tokio::test]
    async fn unsupported_format_returns_415() {
        let err = ProcessingError::from(ExtractionError::UnsupportedFormat {
            name: "scan.exe".into(),
        });
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Unsupported format for file: scan.exe");
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let response = ApiError::BadRequest("Invalid boundary".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid boundary");
    }

    #[tokio::test]
    async fn payload_too_large_returns_413() {
        let response =
            ApiError::PayloadTooLarge("File rx.png exceeds 1024 bytes".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "File rx.png exceeds 1024 bytes");
    }

    #[tokio::test]
    async fn absorbed_extraction_errors_are_internal() {
        let err = ProcessingError::from(ExtractionError::OcrService("boom".into()));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal details stay out of the response
        assert_eq!(json["error"], "An internal error occurred");
        assert_eq!(json["success"], false);
    }
}
