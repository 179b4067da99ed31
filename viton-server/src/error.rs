use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing required files: person_image, clothing_image")]
    MissingFiles,

    /// The multipart body itself was unreadable (truncated, too large, ...).
    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    /// Model loading, decoding or inference failed during a try-on.
    #[error("{0}")]
    TryOn(anyhow::Error),

    #[error("{0}")]
    Internal(anyhow::Error),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::Upload {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::MissingFiles => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::Upload { status, message } => {
                (*status, Json(json!({ "error": message }))).into_response()
            }
            ApiError::TryOn(e) => {
                tracing::error!("Error generating try-on: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": self.to_string() })),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!("{e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
