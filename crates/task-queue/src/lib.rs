//! In-process FIFO queue plus running-task map, guarded by a single logical
//! mutex. Every method here is short and non-blocking; none of them hold
//! the lock across I/O.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use domain::{Task, TaskKey, TaskStatus};
use serde::Serialize;
use tokio::sync::Mutex;

struct Inner {
    pending: VecDeque<Task>,
    running: HashMap<TaskKey, Task>,
}

pub struct TaskQueue {
    max_concurrent: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Serialize)]
pub struct RunningSummary {
    pub issue: String,
    pub repo: String,
    pub started_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub queue_depth: usize,
    pub running_count: usize,
    pub running: Vec<RunningSummary>,
}

impl TaskQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                running: HashMap::new(),
            }),
        }
    }

    /// No-op if the task's (provider, issue) key is already queued or
    /// running. This is the single enforcement point for the "at most one
    /// task per issue" invariant: neither ingress endpoint can regress it.
    pub async fn add(&self, task: Task) -> bool {
        let mut inner = self.inner.lock().await;
        let key = task.key();
        if inner.running.contains_key(&key) || inner.pending.iter().any(|t| t.key() == key) {
            return false;
        }
        inner.pending.push_back(task);
        true
    }

    pub async fn next(&self) -> Option<Task> {
        self.inner.lock().await.pending.pop_front()
    }

    pub async fn mark_running(&self, mut task: Task) -> Task {
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        let key = task.key();
        self.inner.lock().await.running.insert(key, task.clone());
        task
    }

    pub async fn mark_complete(&self, key: &TaskKey) {
        self.inner.lock().await.running.remove(key);
    }

    pub async fn mark_failed(&self, key: &TaskKey) {
        self.inner.lock().await.running.remove(key);
    }

    pub async fn is_queued(&self, key: &TaskKey) -> bool {
        self.inner
            .lock()
            .await
            .pending
            .iter()
            .any(|t| &t.key() == key)
    }

    pub async fn is_running(&self, key: &TaskKey) -> bool {
        self.inner.lock().await.running.contains_key(key)
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn can_start_new(&self) -> bool {
        self.inner.lock().await.running.len() < self.max_concurrent
    }

    pub async fn running_tasks(&self) -> Vec<Task> {
        self.inner.lock().await.running.values().cloned().collect()
    }

    /// Restores a snapshot into the running map as-is, without launching
    /// workers. Used only during crash recovery at boot.
    pub async fn restore_running(&self, tasks: Vec<Task>) {
        let mut inner = self.inner.lock().await;
        for task in tasks {
            inner.running.insert(task.key(), task);
        }
    }

    pub async fn status(&self) -> QueueStatus {
        let inner = self.inner.lock().await;
        QueueStatus {
            queue_depth: inner.pending.len(),
            running_count: inner.running.len(),
            running: inner
                .running
                .values()
                .map(|t| RunningSummary {
                    issue: t.identifier.clone(),
                    repo: t.repo.clone(),
                    started_at: t.started_at,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ProviderTag;
    use std::path::PathBuf;

    fn task(identifier: &str, issue_id: &str) -> Task {
        Task {
            provider: ProviderTag::Linear,
            issue_id: issue_id.to_string(),
            identifier: identifier.to_string(),
            repo: "my-proj".to_string(),
            branch: identifier.to_string(),
            workspace_path: PathBuf::from("/tmp/worktrees").join(identifier),
            title: "Fix crash".to_string(),
            status: TaskStatus::Queued,
            started_at: None,
        }
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = TaskQueue::new(1);
        assert!(queue.add(task("ENG-1", "i1")).await);
        assert!(queue.add(task("ENG-2", "i2")).await);
        assert!(queue.add(task("ENG-3", "i3")).await);

        assert_eq!(queue.next().await.unwrap().identifier, "ENG-1");
        assert_eq!(queue.next().await.unwrap().identifier, "ENG-2");
        assert_eq!(queue.next().await.unwrap().identifier, "ENG-3");
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn duplicate_admission_is_rejected_while_queued() {
        let queue = TaskQueue::new(1);
        assert!(queue.add(task("ENG-1", "i1")).await);
        assert!(!queue.add(task("ENG-1", "i1")).await);
        assert_eq!(queue.size().await, 1);
    }

    #[tokio::test]
    async fn duplicate_admission_is_rejected_while_running() {
        let queue = TaskQueue::new(2);
        let t = task("ENG-1", "i1");
        queue.mark_running(t.clone()).await;
        assert!(!queue.add(task("ENG-1", "i1")).await);
    }

    #[tokio::test]
    async fn can_start_new_respects_concurrency_limit() {
        let queue = TaskQueue::new(1);
        assert!(queue.can_start_new().await);
        queue.mark_running(task("ENG-1", "i1")).await;
        assert!(!queue.can_start_new().await);
        queue.mark_complete(&TaskKey::new(ProviderTag::Linear, "i1")).await;
        assert!(queue.can_start_new().await);
    }

    #[tokio::test]
    async fn restore_running_populates_map_without_pending() {
        let queue = TaskQueue::new(2);
        queue.restore_running(vec![task("ENG-1", "i1")]).await;
        assert!(queue.is_running(&TaskKey::new(ProviderTag::Linear, "i1")).await);
        assert_eq!(queue.size().await, 0);
    }
}
