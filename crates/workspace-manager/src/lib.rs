//! Thin semantic wrappers over the external `git` binary and a
//! hosted-repository CLI (`gh` by default), the same way the reference
//! stack shells out to `gh` rather than reimplementing its protocol.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use utils::shell::resolve_executable_path;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0} executable not found on PATH")]
    NotAvailable(&'static str),
    #[error("git command failed: {0}")]
    GitCommandFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct WorkspaceManager {
    worktrees_root: PathBuf,
    auto_clean_orphans: bool,
    code_host_cli: String,
}

impl WorkspaceManager {
    pub fn new(worktrees_root: PathBuf, auto_clean_orphans: bool, code_host_cli: String) -> Self {
        Self {
            worktrees_root,
            auto_clean_orphans,
            code_host_cli,
        }
    }

    pub fn worktrees_root(&self) -> &Path {
        &self.worktrees_root
    }

    fn git_binary() -> Result<String, WorkspaceError> {
        resolve_executable_path("git").ok_or(WorkspaceError::NotAvailable("git"))
    }

    async fn run_git<I, S>(dir: Option<&Path>, args: I) -> Result<std::process::Output, WorkspaceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let git = Self::git_binary()?;
        let mut cmd = Command::new(git);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        for arg in args {
            cmd.arg(arg.into());
        }
        cmd.output().await.map_err(WorkspaceError::Io)
    }

    /// Idempotent: reuses an existing directory. Otherwise creates a fresh
    /// worktree rooted on a new branch, falling back to the existing
    /// branch if one with that name already exists.
    pub async fn create_worktree(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
    ) -> Result<(), WorkspaceError> {
        if worktree_path.exists() {
            return Ok(());
        }

        let output = Self::run_git(
            Some(repo_path),
            [
                "worktree".to_string(),
                "add".to_string(),
                "-b".to_string(),
                branch.to_string(),
                worktree_path.display().to_string(),
            ],
        )
        .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("already exists") {
            let retry = Self::run_git(
                Some(repo_path),
                [
                    "worktree".to_string(),
                    "add".to_string(),
                    worktree_path.display().to_string(),
                    branch.to_string(),
                ],
            )
            .await?;
            if retry.status.success() {
                return Ok(());
            }
            return Err(WorkspaceError::GitCommandFailed(
                String::from_utf8_lossy(&retry.stderr).to_string(),
            ));
        }

        Err(WorkspaceError::GitCommandFailed(stderr.to_string()))
    }

    pub async fn has_changes(&self, worktree_path: &Path) -> Result<bool, WorkspaceError> {
        let output = Self::run_git(Some(worktree_path), ["status", "--porcelain"]).await?;
        if !output.status.success() {
            return Err(WorkspaceError::GitCommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(!output.stdout.is_empty())
    }

    pub async fn commit_all(&self, worktree_path: &Path, message: &str) -> Result<(), WorkspaceError> {
        let add = Self::run_git(Some(worktree_path), ["add", "-A"]).await?;
        if !add.status.success() {
            return Err(WorkspaceError::GitCommandFailed(
                String::from_utf8_lossy(&add.stderr).to_string(),
            ));
        }

        let commit = Self::run_git(Some(worktree_path), ["commit", "-m", message]).await?;
        if commit.status.success() {
            return Ok(());
        }

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&commit.stdout),
            String::from_utf8_lossy(&commit.stderr)
        );
        if combined.contains("nothing to commit") {
            return Ok(());
        }
        Err(WorkspaceError::GitCommandFailed(combined))
    }

    pub async fn push_branch(&self, worktree_path: &Path, branch: &str) -> Result<(), WorkspaceError> {
        let output = Self::run_git(
            Some(worktree_path),
            ["push", "-u", "origin", branch],
        )
        .await?;
        if output.status.success() {
            return Ok(());
        }
        Err(WorkspaceError::GitCommandFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    /// Best-effort: on any failure this logs the stderr and returns `None`
    /// rather than propagating, per the finalize-step contract.
    pub async fn create_pull_request(
        &self,
        worktree_path: &Path,
        title: &str,
        body: &str,
        base: &str,
    ) -> Option<String> {
        let Some(cli) = resolve_executable_path(&self.code_host_cli) else {
            tracing::warn!(cli = %self.code_host_cli, "hosted-repository CLI not found; skipping PR creation");
            return None;
        };

        let body_file = match tempfile::NamedTempFile::new() {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(error = %err, "failed to create temp file for PR body");
                return None;
            }
        };
        if let Err(err) = tokio::fs::write(body_file.path(), body).await {
            tracing::warn!(error = %err, "failed to write PR body to temp file");
            return None;
        }

        let output = Command::new(cli)
            .current_dir(worktree_path)
            .args([
                "pr",
                "create",
                "--title",
                title,
                "--body-file",
                &body_file.path().display().to_string(),
                "--base",
                base,
            ])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout
                    .lines()
                    .rev()
                    .flat_map(str::split_whitespace)
                    .find(|token| token.starts_with("http"))
                    .map(|url| url.trim_end_matches(['.', ',']).to_string())
            }
            Ok(output) => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "pull request creation failed"
                );
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to invoke hosted-repository CLI");
                None
            }
        }
    }

    /// Enumerates direct children of the worktrees root; anything not in
    /// `running_paths` is an orphan. If auto-clean is enabled each orphan is
    /// removed (via `git worktree remove`, falling back to a forced
    /// directory removal); otherwise orphans are only logged.
    pub async fn cleanup_orphans(&self, running_paths: &[PathBuf]) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut orphans = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.worktrees_root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(orphans),
            Err(err) => return Err(WorkspaceError::Io(err)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if running_paths.iter().any(|p| p == &path) {
                continue;
            }
            orphans.push(path);
        }

        if !self.auto_clean_orphans {
            if !orphans.is_empty() {
                tracing::warn!(?orphans, "orphan workspaces found (AUTO_CLEAN_ORPHANS=false, not removing)");
            }
            return Ok(orphans);
        }

        for orphan in &orphans {
            let removed = Self::run_git(None, ["worktree", "remove", "--force", &orphan.display().to_string()]).await;
            let removed_ok = matches!(removed, Ok(ref out) if out.status.success());
            if !removed_ok {
                tracing::warn!(path = %orphan.display(), "git worktree remove failed, forcing directory removal");
                if let Err(err) = tokio::fs::remove_dir_all(orphan).await {
                    tracing::warn!(path = %orphan.display(), error = %err, "failed to force-remove orphan workspace");
                }
            }
        }

        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_worktree_reuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path().to_path_buf(), false, "gh".into());
        let existing = dir.path().join("already-here");
        tokio::fs::create_dir_all(&existing).await.unwrap();

        let result = manager
            .create_worktree(dir.path(), &existing, "some-branch")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cleanup_orphans_reports_without_removing_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let orphan_dir = dir.path().join("orphan-1");
        tokio::fs::create_dir_all(&orphan_dir).await.unwrap();

        let manager = WorkspaceManager::new(dir.path().to_path_buf(), false, "gh".into());
        let orphans = manager.cleanup_orphans(&[]).await.unwrap();

        assert_eq!(orphans, vec![orphan_dir.clone()]);
        assert!(orphan_dir.exists());
    }

    #[tokio::test]
    async fn cleanup_orphans_skips_known_running_paths() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("running-1");
        tokio::fs::create_dir_all(&kept).await.unwrap();

        let manager = WorkspaceManager::new(dir.path().to_path_buf(), false, "gh".into());
        let orphans = manager.cleanup_orphans(&[kept.clone()]).await.unwrap();

        assert!(orphans.is_empty());
    }

    #[tokio::test]
    async fn missing_worktrees_root_has_no_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let missing_root = dir.path().join("does-not-exist");
        let manager = WorkspaceManager::new(missing_root, false, "gh".into());
        let orphans = manager.cleanup_orphans(&[]).await.unwrap();
        assert!(orphans.is_empty());
    }
}
