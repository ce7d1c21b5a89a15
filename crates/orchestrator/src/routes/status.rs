use axum::Json;
use axum::extract::State;
use serde::Serialize;
use task_queue::QueueStatus;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    queue: QueueStatus,
    providers: Vec<&'static str>,
}

pub async fn handle(State(state): State<AppState>) -> Json<StatusResponse> {
    let queue = state.queue.status().await;
    Json(StatusResponse {
        queue,
        providers: state
            .providers
            .configured_tags()
            .into_iter()
            .map(|t| t.as_str())
            .collect(),
    })
}
