use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("issue not found upstream")]
    NotFound,
    #[error("webhook signature invalid")]
    SignatureInvalid,
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("github api error: {0}")]
    GitHub(#[from] octocrab::Error),
    #[error("upstream returned unexpected data: {0}")]
    UnexpectedResponse(String),
    #[error("workflow state '{wanted}' not found; available states: {available}")]
    StateNotFound { wanted: String, available: String },
}

pub type Result<T> = std::result::Result<T, ProviderError>;
