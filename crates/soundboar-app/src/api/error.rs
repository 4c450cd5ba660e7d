//! Mapping of domain errors onto HTTP responses.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use soundboar_core::Error;
use tracing::{error, warn};

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            Error::Engine(_)
            | Error::AudioDecode(_)
            | Error::AudioOutput(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self(Error::InvalidArgument(format!("Malformed upload: {error}")))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self(Error::Internal(format!("Background task failed: {error}")))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!("{message}");
        } else {
            warn!("{message}");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
