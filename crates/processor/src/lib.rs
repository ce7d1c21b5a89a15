//! Single process-lifetime scheduler. `start()` arms the 1-second poll tick;
//! `trigger()` is called by ingress right after admission so a newly queued
//! task doesn't wait for the next tick when capacity is free. Both paths
//! funnel into the same dispatch loop; concurrency beyond one in-flight task
//! comes from the fact that each HTTP handler and the tick loop are already
//! separate tokio tasks, not from anything spawned here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_runner::AgentRunner;
use domain::{RunningSnapshot, TaskOutcome};
use providers::ProviderRegistry;
use state_store::StateStore;
use task_queue::TaskQueue;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Processor {
    queue: Arc<TaskQueue>,
    state_store: Arc<StateStore>,
    providers: Arc<ProviderRegistry>,
    runner: Arc<AgentRunner>,
    started: AtomicBool,
}

impl Processor {
    pub fn new(
        queue: Arc<TaskQueue>,
        state_store: Arc<StateStore>,
        providers: Arc<ProviderRegistry>,
        runner: Arc<AgentRunner>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            state_store,
            providers,
            runner,
            started: AtomicBool::new(false),
        })
    }

    /// Idempotent: a second call warns and no-ops rather than spawning a
    /// duplicate tick loop.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("processor already started, ignoring duplicate start()");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                this.dispatch_loop().await;
            }
        });
    }

    pub async fn trigger(&self) {
        self.dispatch_loop().await;
    }

    /// While there's pending work and spare capacity, claims the next task,
    /// persists the running snapshot, and runs it to completion before
    /// looping back to check for more. Any error surfaced by the agent
    /// runner has already been folded into `TaskOutcome::Failed` by the
    /// runner itself, so this boundary never sees a bare `Result::Err` to
    /// propagate — it only classifies the outcome for the queue and log.
    async fn dispatch_loop(&self) {
        loop {
            if !self.queue.can_start_new().await || self.queue.size().await == 0 {
                return;
            }

            let Some(task) = self.queue.next().await else {
                return;
            };

            let Some(provider) = self.providers.get(task.provider) else {
                tracing::error!(
                    issue = %task.identifier,
                    "provider disappeared from registry between admission and dispatch"
                );
                continue;
            };

            let identifier = task.identifier.clone();
            let running_task = self.queue.mark_running(task).await;
            let key = running_task.key();
            self.persist_running_snapshot().await;

            tracing::info!(issue = %identifier, "dispatching task");
            let outcome = self.runner.run(&running_task, provider).await;

            match &outcome {
                TaskOutcome::Failed { reason, .. } => {
                    tracing::warn!(issue = %identifier, reason = %reason, "task finished with failure");
                    self.queue.mark_failed(&key).await;
                }
                TaskOutcome::CompletedWithChanges { branch, pr_url } => {
                    tracing::info!(issue = %identifier, branch = %branch, pr_url = ?pr_url, "task completed with changes");
                    self.queue.mark_complete(&key).await;
                }
                TaskOutcome::CompletedNoChanges { branch } => {
                    tracing::info!(issue = %identifier, branch = %branch, "task completed with no changes");
                    self.queue.mark_complete(&key).await;
                }
            }

            self.persist_running_snapshot().await;
        }
    }

    async fn persist_running_snapshot(&self) {
        let running = self.queue.running_tasks().await;
        let snapshot = RunningSnapshot::new(running);
        if let Err(err) = self.state_store.save(&snapshot).await {
            tracing::warn!(error = %err, "failed to persist running snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::LinearConfig;
    use workspace_manager::WorkspaceManager;

    fn registry() -> Arc<ProviderRegistry> {
        let config = LinearConfig {
            api_key: "key".into(),
            webhook_secret: "secret".into(),
            trigger_label: "ai-attempt".into(),
            repo_custom_field_name: "Repository".into(),
            in_progress_status: "In Progress".into(),
            review_status: "In Review".into(),
            include_comments: true,
        };
        Arc::new(ProviderRegistry::new().with_linear(config))
    }

    #[tokio::test]
    async fn dispatch_loop_exits_immediately_when_queue_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TaskQueue::new(1));
        let state_store = Arc::new(StateStore::new(dir.path().join("state.json")));
        let workspace = WorkspaceManager::new(dir.path().to_path_buf(), false, "gh".into());
        let runner = Arc::new(AgentRunner::new(
            agent_runner::RunnerConfig {
                repos_root: dir.path().to_path_buf(),
                log_dir: dir.path().join("logs"),
                agent_binary: "does-not-exist-binary".into(),
                agent_timeout: Duration::from_millis(50),
            },
            workspace,
        ));
        let processor = Processor::new(queue.clone(), state_store, registry(), runner);
        processor.trigger().await;
        assert_eq!(queue.size().await, 0);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TaskQueue::new(1));
        let state_store = Arc::new(StateStore::new(dir.path().join("state.json")));
        let workspace = WorkspaceManager::new(dir.path().to_path_buf(), false, "gh".into());
        let runner = Arc::new(AgentRunner::new(
            agent_runner::RunnerConfig {
                repos_root: dir.path().to_path_buf(),
                log_dir: dir.path().join("logs"),
                agent_binary: "does-not-exist-binary".into(),
                agent_timeout: Duration::from_millis(50),
            },
            workspace,
        ));
        let processor = Processor::new(queue, state_store, registry(), runner);
        processor.start();
        assert!(processor.started.load(Ordering::SeqCst));
        processor.start();
        assert!(processor.started.load(Ordering::SeqCst));
    }
}
