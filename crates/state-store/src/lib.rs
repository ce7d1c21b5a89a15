//! Atomic persistence of the running-task snapshot. This file is the only
//! thing the service ever persists; its failure modes are all log-only,
//! per the error taxonomy's `StateIOError`.

use std::path::{Path, PathBuf};

use domain::RunningSnapshot;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("failed to read state file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write state file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to rename state file into place: {0}")]
    Rename(#[source] std::io::Error),
    #[error("state file contents are corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

pub struct StateStore {
    path: PathBuf,
    tmp_path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = Self::sibling_tmp(&path);
        Self {
            path,
            tmp_path,
            write_lock: Mutex::new(()),
        }
    }

    fn sibling_tmp(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Reads are tolerant: a missing file yields an empty snapshot, and
    /// corrupt contents are logged and treated as empty rather than
    /// propagated, so a bad state file never blocks startup.
    pub async fn load(&self) -> RunningSnapshot {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(error = %err, path = %self.path.display(), "state file is corrupt, starting empty");
                    RunningSnapshot::empty()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RunningSnapshot::empty(),
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "failed to read state file, starting empty");
                RunningSnapshot::empty()
            }
        }
    }

    /// Serializes to a sibling temp path, then renames over the target.
    /// Writes are serialized behind an internal lock so concurrent saves
    /// (dispatch + mark-complete racing) never interleave.
    pub async fn save(&self, snapshot: &RunningSnapshot) -> Result<(), StateStoreError> {
        let _guard = self.write_lock.lock().await;
        let serialized =
            serde_json::to_string_pretty(snapshot).map_err(StateStoreError::Corrupt)?;
        tokio::fs::write(&self.tmp_path, serialized)
            .await
            .map_err(StateStoreError::Write)?;
        tokio::fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(StateStoreError::Rename)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ProviderTag, Task, TaskStatus};
    use std::path::PathBuf as StdPathBuf;

    fn sample_task() -> Task {
        Task {
            provider: ProviderTag::Linear,
            issue_id: "i1".into(),
            identifier: "ENG-1".into(),
            repo: "my-proj".into(),
            branch: "ENG-1".into(),
            workspace_path: StdPathBuf::from("/tmp/worktrees/ENG-1"),
            title: "Fix crash".into(),
            status: TaskStatus::Running,
            started_at: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let snapshot = store.load().await;
        assert!(snapshot.running_agents.is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let snapshot = RunningSnapshot::new(vec![sample_task()]);
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.running_agents.len(), 1);
        assert_eq!(loaded.running_agents[0].identifier, "ENG-1");
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        let store = StateStore::new(path);
        let snapshot = store.load().await;
        assert!(snapshot.running_agents.is_empty());
    }
}
