use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Ingress-facing error taxonomy (§7). Each variant maps to exactly one
/// status code; the body is always `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid signature")]
    SignatureInvalid,
    #[error("provider '{0}' is not configured")]
    NotConfigured(&'static str),
    #[error("provider '{0}' is not configured")]
    RetryNotConfigured(&'static str),
    #[error("issue not found")]
    UpstreamNotFound,
    #[error("repository could not be resolved for this issue")]
    RepoUnresolved,
    #[error("issue is already queued or running")]
    Duplicate,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error(transparent)]
    Provider(#[from] providers::ProviderError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RetryNotConfigured(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamNotFound => StatusCode::NOT_FOUND,
            ApiError::RepoUnresolved => StatusCode::BAD_REQUEST,
            ApiError::Duplicate => StatusCode::CONFLICT,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(err) => match err {
                providers::ProviderError::NotFound => StatusCode::NOT_FOUND,
                providers::ProviderError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_REQUEST,
            },
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
