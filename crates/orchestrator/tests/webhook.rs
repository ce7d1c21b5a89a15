use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use orchestrator::routes;
use orchestrator::state::AppState;
use providers::{LinearConfig, ProviderRegistry};
use tower::ServiceExt;

fn linear_config() -> LinearConfig {
    LinearConfig {
        api_key: "key".into(),
        webhook_secret: "s3cret".into(),
        trigger_label: "ai-attempt".into(),
        repo_custom_field_name: "Repository".into(),
        in_progress_status: "In Progress".into(),
        review_status: "In Review".into(),
        include_comments: true,
    }
}

async fn test_state(dir: &std::path::Path) -> AppState {
    let providers = Arc::new(ProviderRegistry::new().with_linear(linear_config()));
    let queue = Arc::new(task_queue::TaskQueue::new(1));
    let state_store = Arc::new(state_store::StateStore::new(dir.join("state.json")));
    let workspace = workspace_manager::WorkspaceManager::new(dir.to_path_buf(), false, "gh".into());
    let runner = Arc::new(agent_runner::AgentRunner::new(
        agent_runner::RunnerConfig {
            repos_root: dir.to_path_buf(),
            log_dir: dir.join("logs"),
            agent_binary: "does-not-exist".into(),
            agent_timeout: std::time::Duration::from_millis(50),
        },
        workspace,
    ));
    let processor = processor::Processor::new(
        Arc::clone(&queue),
        Arc::clone(&state_store),
        Arc::clone(&providers),
        runner,
    );

    AppState {
        providers,
        queue,
        state_store,
        processor,
        worktrees_path: dir.join("worktrees"),
        started_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn webhook_rejects_invalid_signature() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/linear")
        .header("content-type", "application/json")
        .header("Linear-Signature", "0000")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Invalid signature");
}

#[tokio::test]
async fn webhook_for_unknown_provider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/jira")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_configured_providers() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = routes::router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["providers"], serde_json::json!(["linear"]));
}
