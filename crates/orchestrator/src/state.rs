use std::sync::Arc;

use processor::Processor;
use providers::ProviderRegistry;
use state_store::StateStore;
use task_queue::TaskQueue;

use crate::config::Config;

/// Process-wide singletons, cloned cheaply into every handler via
/// `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub providers: Arc<ProviderRegistry>,
    pub queue: Arc<TaskQueue>,
    pub state_store: Arc<StateStore>,
    pub processor: Arc<Processor>,
    pub worktrees_path: std::path::PathBuf,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn worktrees_path_for(&self, branch: &str) -> std::path::PathBuf {
        self.worktrees_path.join(branch)
    }
}

/// Builds the provider registry and queue/state-store/processor wiring. This
/// is the boot sequence's middle section, pulled out so `main.rs` stays a
/// thin driver over it.
pub async fn bootstrap(config: Config) -> anyhow::Result<AppState> {
    let mut registry = ProviderRegistry::new();
    if let Some(linear) = config.linear {
        registry = registry.with_linear(linear);
    }
    if let Some(github) = config.github {
        registry = registry.with_github(github)?;
    }
    let providers = Arc::new(registry);

    let queue = Arc::new(TaskQueue::new(config.max_concurrent_agents));
    let state_store = Arc::new(StateStore::new("state.json"));

    let snapshot = state_store.load().await;
    if !snapshot.running_agents.is_empty() {
        tracing::info!(
            count = snapshot.running_agents.len(),
            "restoring running tasks from state file"
        );
        queue.restore_running(snapshot.running_agents).await;
    }

    let workspace = workspace_manager::WorkspaceManager::new(
        config.worktrees_path.clone(),
        config.auto_clean_orphans,
        config.code_host_cli.clone(),
    );

    let running_paths: Vec<_> = queue
        .running_tasks()
        .await
        .into_iter()
        .map(|t| t.workspace_path)
        .collect();
    match workspace.cleanup_orphans(&running_paths).await {
        Ok(orphans) if !orphans.is_empty() => {
            tracing::info!(count = orphans.len(), "orphan workspaces handled at startup")
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "orphan cleanup failed at startup"),
    }

    let runner = Arc::new(agent_runner::AgentRunner::new(
        agent_runner::RunnerConfig {
            repos_root: config.repos_base_path.clone(),
            log_dir: std::path::PathBuf::from("logs"),
            agent_binary: config.agent_binary.clone(),
            agent_timeout: config.agent_timeout,
        },
        workspace,
    ));

    let processor = Processor::new(
        Arc::clone(&queue),
        Arc::clone(&state_store),
        Arc::clone(&providers),
        runner,
    );
    processor.start();

    Ok(AppState {
        providers,
        queue,
        state_store,
        processor,
        worktrees_path: config.worktrees_path,
        started_at: chrono::Utc::now(),
    })
}
