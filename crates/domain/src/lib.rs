//! Provider-independent data model shared by ingress, the provider adapters,
//! the task queue, and the agent runner.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tracker a task or issue originated from. Never grows beyond what
/// ingress and the agent runner need to dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Linear,
    GitHub,
}

impl ProviderTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::Linear => "linear",
            ProviderTag::GitHub => "github",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "linear" => Some(ProviderTag::Linear),
            "github" => Some(ProviderTag::GitHub),
            _ => None,
        }
    }
}

/// The logical phase an issue is moved to around an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    InProgress,
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentIssue {
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
}

/// Provider-independent view of an issue. Every adapter maps its native
/// representation into this shape before handing it to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub labels: Vec<Label>,
    pub comments: Vec<Comment>,
    pub parent: Option<ParentIssue>,
    pub repository_hint: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels
            .iter()
            .any(|l| l.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// A stable identity for deduplicating admission: the same (provider, issue)
/// pair may never have more than one live Task across queue and running set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub provider: ProviderTag,
    pub issue_id: String,
}

impl TaskKey {
    pub fn new(provider: ProviderTag, issue_id: impl Into<String>) -> Self {
        Self {
            provider,
            issue_id: issue_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub provider: ProviderTag,
    pub issue_id: String,
    pub identifier: String,
    pub repo: String,
    pub branch: String,
    pub workspace_path: PathBuf,
    pub title: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.provider, self.issue_id.clone())
    }
}

/// The sole persisted datum: a snapshot of the running set, written
/// atomically to `state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningSnapshot {
    #[serde(rename = "runningAgents")]
    pub running_agents: Vec<Task>,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

impl RunningSnapshot {
    pub fn new(running_agents: Vec<Task>) -> Self {
        Self {
            running_agents,
            saved_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            running_agents: Vec::new(),
            saved_at: Utc::now(),
        }
    }
}

/// Outcome of a completed agent run, carried from the agent runner back to
/// the processor for logging and from there nowhere else (completed tasks
/// are not persisted).
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    CompletedWithChanges {
        branch: String,
        pr_url: Option<String>,
    },
    CompletedNoChanges {
        branch: String,
    },
    Failed {
        branch: String,
        reason: String,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TaskOutcome::Failed { .. })
    }
}
