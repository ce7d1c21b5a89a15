use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod health;
pub mod retry;
pub mod status;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/{provider}", post(webhook::handle))
        .route("/retry/{issueId}", post(retry::handle))
        .route("/health", get(health::handle))
        .route("/status", get(status::handle))
        .with_state(state)
}
