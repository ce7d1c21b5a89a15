use domain::{ProviderTag, Task, TaskStatus};
use providers::{Provider, ProviderError};

use crate::error::ApiError;
use crate::state::AppState;

pub enum AdmitOutcome {
    Enqueued { identifier: String },
    AlreadyProcessing,
}

/// Shared by the webhook and retry endpoints (§4.2 Admission): fetch the
/// issue, resolve repository and branch, insert into the queue, and signal
/// the processor. Callers translate a `Duplicate` result into their own
/// status code. The provider-not-configured check below maps to 400
/// (retry's contract); the webhook handler checks configuration itself,
/// before calling this, and returns 503 on its own — this function is only
/// reached once a provider is already known to be configured there.
pub async fn admit(
    state: &AppState,
    tag: ProviderTag,
    issue_id: &str,
) -> Result<AdmitOutcome, ApiError> {
    let provider = state
        .providers
        .get(tag)
        .ok_or(ApiError::RetryNotConfigured(tag.as_str()))?;

    let issue = provider.get_issue(issue_id).await.map_err(|err| match err {
        ProviderError::NotFound => ApiError::UpstreamNotFound,
        other => ApiError::Provider(other),
    })?;

    let repo = provider
        .get_repository(&issue)
        .ok_or(ApiError::RepoUnresolved)?;
    let branch = branch_name(provider, &issue)?;
    let workspace_path = state.worktrees_path_for(&branch);

    let task = Task {
        provider: tag,
        issue_id: issue_id.to_string(),
        identifier: issue.identifier.clone(),
        repo,
        branch,
        workspace_path,
        title: issue.title.clone(),
        status: TaskStatus::Queued,
        started_at: None,
    };

    let identifier = task.identifier.clone();
    if !state.queue.add(task).await {
        return Ok(AdmitOutcome::AlreadyProcessing);
    }

    let processor = state.processor.clone();
    tokio::spawn(async move { processor.trigger().await });

    Ok(AdmitOutcome::Enqueued { identifier })
}

fn branch_name(provider: &Provider, issue: &domain::Issue) -> Result<String, ApiError> {
    provider.get_branch_name(issue).map_err(ApiError::Provider)
}
