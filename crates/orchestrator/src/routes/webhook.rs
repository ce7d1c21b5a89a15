use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::ProviderTag;
use serde::Serialize;
use serde_json::Value;

use crate::admission::{self, AdmitOutcome};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookResponse {
    Enqueued { #[serde(rename = "issueId")] issue_id: String },
    AlreadyProcessing,
    Ignored,
}

/// Webhook endpoints parse the body only after signature verification, per
/// §6: the raw bytes are what the HMAC is computed over, not a re-serialized
/// `Value`.
pub async fn handle(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let tag = ProviderTag::parse(&provider_name)
        .ok_or_else(|| ApiError::UnknownProvider(provider_name.clone()))?;

    let provider = state
        .providers
        .get(tag)
        .ok_or(ApiError::NotConfigured(tag.as_str()))?;

    let signature_header = match tag {
        ProviderTag::Linear => header_value(&headers, "Linear-Signature"),
        ProviderTag::GitHub => header_value(&headers, "X-Hub-Signature-256"),
    };
    if !provider.verify_webhook(&body, signature_header.as_deref()) {
        return Err(ApiError::SignatureInvalid);
    }

    let event: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::MalformedBody(err.to_string()))?;

    let issue_id = match tag {
        ProviderTag::Linear => providers::linear_should_trigger(provider, &event),
        ProviderTag::GitHub => {
            let event_name = header_value(&headers, "X-GitHub-Event").unwrap_or_default();
            providers::github_should_trigger(provider, &event_name, &event)
        }
    };

    let Some(issue_id) = issue_id else {
        return Ok(Json(WebhookResponse::Ignored));
    };

    match admission::admit(&state, tag, &issue_id).await? {
        AdmitOutcome::Enqueued { identifier } => Ok(Json(WebhookResponse::Enqueued { issue_id: identifier })),
        AdmitOutcome::AlreadyProcessing => Ok(Json(WebhookResponse::AlreadyProcessing)),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}
