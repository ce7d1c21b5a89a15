use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_seconds: i64,
    providers: Vec<&'static str>,
}

pub async fn handle(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(HealthResponse {
        status: "ok",
        uptime_seconds,
        providers: state
            .providers
            .configured_tags()
            .into_iter()
            .map(|t| t.as_str())
            .collect(),
    })
}
