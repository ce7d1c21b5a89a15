pub mod prompt;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use command_group::AsyncCommandGroup;
use domain::{Issue, StatusPhase, Task, TaskOutcome};
use providers::Provider;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use workspace_manager::WorkspaceManager;

pub struct RunnerConfig {
    pub repos_root: PathBuf,
    pub log_dir: PathBuf,
    pub agent_binary: String,
    pub agent_timeout: Duration,
}

pub struct AgentRunner {
    config: RunnerConfig,
    workspace: WorkspaceManager,
}

impl AgentRunner {
    pub fn new(config: RunnerConfig, workspace: WorkspaceManager) -> Self {
        Self { config, workspace }
    }

    /// Runs the ordered steps in §4.6. Any step's failure transitions
    /// directly to `TaskOutcome::Failed` carrying the branch derived so
    /// far (the task's own branch, computed once at admission).
    pub async fn run(&self, task: &Task, provider: &Provider) -> TaskOutcome {
        let branch = task.branch.clone();
        let mut log = IssueLog::open(&self.config.log_dir, &task.identifier).await;

        let issue = match provider.get_issue(&task.issue_id).await {
            Ok(issue) => issue,
            Err(err) => {
                log.line(&format!("failed to fetch issue: {err}")).await;
                return TaskOutcome::Failed {
                    branch,
                    reason: format!("failed to fetch issue: {err}"),
                };
            }
        };

        let repo_path = self.config.repos_root.join(&task.repo);

        if let Err(err) = self
            .workspace
            .create_worktree(&repo_path, &task.workspace_path, &branch)
            .await
        {
            log.line(&format!("workspace creation failed: {err}")).await;
            return TaskOutcome::Failed {
                branch,
                reason: format!("workspace creation failed: {err}"),
            };
        }

        if let Err(err) = provider
            .update_status(&task.issue_id, StatusPhase::InProgress)
            .await
        {
            tracing::warn!(issue = %task.identifier, error = %err, "failed to update status to in_progress");
        }

        if let Err(err) = provider
            .add_comment(
                &task.issue_id,
                &format!(
                    "Starting automated attempt on branch `{branch}`. Log: `logs/{}.log`",
                    task.identifier
                ),
            )
            .await
        {
            tracing::warn!(issue = %task.identifier, error = %err, "failed to post starting comment");
        }

        let prompt_text = prompt::build_prompt(&issue, &task.identifier, &task.repo, &branch);
        log.line(&format!("launching agent with prompt:\n{prompt_text}")).await;

        match self.run_agent(&task.workspace_path, &prompt_text, &mut log).await {
            Err(reason) => {
                self.finalize_failure(provider, task, &branch, &reason).await;
                TaskOutcome::Failed { branch, reason }
            }
            Ok(()) => self.finalize_success(provider, task, &issue, &branch, &mut log).await,
        }
    }

    async fn run_agent(
        &self,
        workspace_path: &std::path::Path,
        prompt_text: &str,
        log: &mut IssueLog,
    ) -> Result<(), String> {
        let mut command = Command::new(&self.config.agent_binary);
        command
            .arg("-p")
            .arg(prompt_text)
            .current_dir(workspace_path)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .group_spawn()
            .map_err(|err| format!("failed to launch agent: {err}"))?;

        let stdout = child.inner().stdout.take();
        let stderr = child.inner().stderr.take();

        let stdout_task = stdout.map(|s| tokio::spawn(drain_to_string(s)));
        let stderr_task = stderr.map(|s| tokio::spawn(drain_to_string(s)));

        let wait_result = tokio::time::timeout(self.config.agent_timeout, child.wait()).await;

        let (stdout_text, stderr_text) = match (stdout_task, stderr_task) {
            (Some(o), Some(e)) => (
                o.await.unwrap_or_default(),
                e.await.unwrap_or_default(),
            ),
            _ => (String::new(), String::new()),
        };
        log.line(&format!("agent stdout:\n{stdout_text}")).await;
        log.line(&format!("agent stderr:\n{stderr_text}")).await;

        let status = match wait_result {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => return Err(format!("failed waiting on agent process: {err}")),
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait().await;
                let minutes = self.config.agent_timeout.as_secs() / 60;
                return Err(format!("agent timed out after {minutes} minutes"));
            }
        };

        if status.success() {
            return Ok(());
        }

        let head = if !stderr_text.trim().is_empty() {
            &stderr_text
        } else {
            &stdout_text
        };
        let truncated: String = head.chars().take(2000).collect();
        Err(format!(
            "agent exited with code {}: {truncated}",
            status.code().unwrap_or(-1)
        ))
    }

    async fn finalize_failure(&self, provider: &Provider, task: &Task, branch: &str, reason: &str) {
        if let Err(err) = provider
            .add_comment(
                &task.issue_id,
                &format!("Automated attempt on branch `{branch}` failed: {reason}"),
            )
            .await
        {
            tracing::warn!(issue = %task.identifier, error = %err, "failed to post failure comment");
        }
    }

    async fn finalize_success(
        &self,
        provider: &Provider,
        task: &Task,
        issue: &Issue,
        branch: &str,
        log: &mut IssueLog,
    ) -> TaskOutcome {
        let has_changes = match self.workspace.has_changes(&task.workspace_path).await {
            Ok(v) => v,
            Err(err) => {
                log.line(&format!("failed to check for changes: {err}")).await;
                return TaskOutcome::Failed {
                    branch: branch.to_string(),
                    reason: format!("failed to inspect workspace: {err}"),
                };
            }
        };

        if !has_changes {
            if let Err(err) = provider
                .add_comment(&task.issue_id, "Automated attempt completed with no code changes.")
                .await
            {
                tracing::warn!(issue = %task.identifier, error = %err, "failed to post no-changes comment");
            }
            if let Err(err) = provider.update_status(&task.issue_id, StatusPhase::Review).await {
                tracing::warn!(issue = %task.identifier, error = %err, "failed to update status to review");
            }
            return TaskOutcome::CompletedNoChanges {
                branch: branch.to_string(),
            };
        }

        if let Err(err) = self
            .workspace
            .commit_all(&task.workspace_path, &format!("feat: {}", task.title))
            .await
        {
            return TaskOutcome::Failed {
                branch: branch.to_string(),
                reason: format!("commit failed: {err}"),
            };
        }

        if let Err(err) = self.workspace.push_branch(&task.workspace_path, branch).await {
            return TaskOutcome::Failed {
                branch: branch.to_string(),
                reason: format!("push failed: {err}"),
            };
        }

        let pr_body = format!("Resolves {}\n\nOpened automatically.", task.identifier);
        let pr_url = self
            .workspace
            .create_pull_request(
                &task.workspace_path,
                &format!("{}: {}", task.identifier, task.title),
                &pr_body,
                "main",
            )
            .await;

        let comment = match &pr_url {
            Some(url) => format!("Automated attempt completed on branch `{branch}`. Pull request: {url}"),
            None => format!("Automated attempt completed on branch `{branch}`."),
        };
        if let Err(err) = provider.add_comment(&task.issue_id, &comment).await {
            tracing::warn!(issue = %task.identifier, error = %err, "failed to post completion comment");
        }
        if let Err(err) = provider.update_status(&task.issue_id, StatusPhase::Review).await {
            tracing::warn!(issue = %task.identifier, error = %err, "failed to update status to review");
        }

        let _ = issue;
        TaskOutcome::CompletedWithChanges {
            branch: branch.to_string(),
            pr_url,
        }
    }
}

async fn drain_to_string<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> String {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    let _ = reader.read_to_string(&mut buf).await;
    buf
}

/// Per-issue log file under `logs/{identifier}.log`. Lines are plain text,
/// not `tracing`-formatted output, because this file is a user-facing
/// audit trail rather than an operational log stream.
struct IssueLog {
    file: Option<tokio::fs::File>,
}

impl IssueLog {
    async fn open(dir: &std::path::Path, identifier: &str) -> Self {
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!(error = %err, "failed to create log directory");
            return Self { file: None };
        }
        let path = dir.join(format!("{identifier}.log"));
        match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
        {
            Ok(file) => Self { file: Some(file) },
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to open issue log file");
                Self { file: None }
            }
        }
    }

    async fn line(&mut self, message: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let timestamp = chrono::Utc::now().to_rfc3339();
        let formatted = format!("[{timestamp}] [INFO] {message}\n");
        if let Err(err) = file.write_all(formatted.as_bytes()).await {
            tracing::warn!(error = %err, "failed to write to issue log file");
        }
    }
}
