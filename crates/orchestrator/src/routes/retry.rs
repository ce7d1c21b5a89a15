use axum::Json;
use axum::extract::{Path, Query, State};
use domain::ProviderTag;
use serde::{Deserialize, Serialize};

use crate::admission::{self, AdmitOutcome};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RetryQuery {
    pub provider: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetryResponse {
    Enqueued { #[serde(rename = "issueId")] issue_id: String },
}

/// Re-admission without webhook verification; duplicates are a hard 409
/// here rather than the webhook's 200 `already_processing`, per §4.2.
pub async fn handle(
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
    Query(query): Query<RetryQuery>,
) -> Result<Json<RetryResponse>, ApiError> {
    let tag = ProviderTag::parse(&query.provider)
        .ok_or_else(|| ApiError::UnknownProvider(query.provider.clone()))?;

    match admission::admit(&state, tag, &issue_id).await? {
        AdmitOutcome::Enqueued { identifier } => Ok(Json(RetryResponse::Enqueued { issue_id: identifier })),
        AdmitOutcome::AlreadyProcessing => Err(ApiError::Duplicate),
    }
}
