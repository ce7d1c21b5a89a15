//! REST-style hosted repository host adapter (GitHub Issues).

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use domain::{Comment, Issue, Label, StatusPhase};
use octocrab::Octocrab;
use octocrab::params::State;
use serde_json::{Value, json};

use crate::error::{ProviderError, Result};
use crate::signature;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub webhook_secret: String,
    pub trigger_label: String,
    pub in_progress_label: String,
    pub review_label: String,
    pub include_comments: bool,
}

pub struct GitHubProvider {
    config: GitHubConfig,
    client: Octocrab,
}

impl GitHubProvider {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(config.token.clone())
            .build()?;
        Ok(Self { config, client })
    }

    fn retry_policy() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(15))
            .with_max_times(3)
            .with_jitter()
    }

    /// `id` is `owner/repo#number`, the opaque id this adapter hands back
    /// from `should_trigger`.
    pub async fn get_issue(&self, id: &str) -> Result<Issue> {
        let (owner, repo, number) = parse_issue_id(id)?;

        let issue = (|| async {
            self.client
                .issues(&owner, &repo)
                .get(number)
                .await
        })
        .retry(Self::retry_policy())
        .when(|e| !matches!(e, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404))
        .await
        .map_err(|e| match e {
            octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404 => {
                ProviderError::NotFound
            }
            other => ProviderError::GitHub(other),
        })?;

        let labels = issue
            .labels
            .into_iter()
            .map(|l| Label {
                id: l.id.to_string(),
                name: l.name,
            })
            .collect();

        let mut comments = Vec::new();
        if self.config.include_comments {
            let page = self
                .client
                .issues(&owner, &repo)
                .list_comments(number)
                .send()
                .await?;
            comments = page
                .items
                .into_iter()
                .map(|c| Comment {
                    id: c.id.to_string(),
                    body: c.body.unwrap_or_default(),
                    created_at: c.created_at,
                    author: Some(c.user.login),
                })
                .collect();
            comments.sort_by_key(|c| c.created_at);
        }

        let metadata = json!({ "owner": owner, "repo": repo, "number": number });

        Ok(Issue {
            id: id.to_string(),
            identifier: format!("{owner}/{repo}#{number}"),
            title: issue.title,
            description: issue.body,
            labels,
            comments,
            parent: None,
            repository_hint: Some(format!("{owner}/{repo}")),
            metadata,
        })
    }

    pub fn get_repository(issue: &Issue) -> Option<String> {
        issue.repository_hint.clone()
    }

    pub fn get_branch_name(issue: &Issue) -> Result<String> {
        let owner = issue
            .metadata
            .get("owner")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::UnexpectedResponse("missing owner in metadata".into()))?;
        let repo = issue
            .metadata
            .get("repo")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::UnexpectedResponse("missing repo in metadata".into()))?;
        let number = issue
            .metadata
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| ProviderError::UnexpectedResponse("missing number in metadata".into()))?;
        Ok(format!("{owner}-{repo}-{number}"))
    }

    pub async fn update_status(&self, issue_id: &str, phase: StatusPhase) -> Result<()> {
        let (owner, repo, number) = parse_issue_id(issue_id)?;

        let current = self.client.issues(&owner, &repo).get(number).await?;
        let mut names: Vec<String> = current.labels.into_iter().map(|l| l.name).collect();
        names.retain(|n| {
            !n.eq_ignore_ascii_case(&self.config.in_progress_label)
                && !n.eq_ignore_ascii_case(&self.config.review_label)
        });
        let to_add = match phase {
            StatusPhase::InProgress => &self.config.in_progress_label,
            StatusPhase::Review => &self.config.review_label,
        };
        names.push(to_add.clone());

        self.client
            .issues(&owner, &repo)
            .update(number)
            .labels(&names)
            .send()
            .await?;
        Ok(())
    }

    pub async fn add_comment(&self, issue_id: &str, markdown: &str) -> Result<()> {
        let (owner, repo, number) = parse_issue_id(issue_id)?;
        self.client
            .issues(&owner, &repo)
            .create_comment(number, markdown)
            .await?;
        Ok(())
    }

    pub fn verify_webhook(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool {
        match signature_header {
            Some(header) => {
                signature::verify_prefixed_digest(raw_body, &self.config.webhook_secret, header)
            }
            None => false,
        }
    }

    /// Returns `Some(owner/repo#number)` when the webhook payload is an
    /// `issues` event labeling the issue with the configured trigger label.
    pub fn should_trigger(&self, event_name: &str, event: &Value) -> Option<String> {
        if event_name != "issues" {
            return None;
        }
        if event.get("action").and_then(Value::as_str) != Some("labeled") {
            return None;
        }
        let label_name = event.pointer("/label/name").and_then(Value::as_str)?;
        if !label_name.eq_ignore_ascii_case(&self.config.trigger_label) {
            return None;
        }
        let number = event.pointer("/issue/number").and_then(Value::as_u64)?;
        let full_name = event
            .pointer("/repository/full_name")
            .and_then(Value::as_str)?;
        Some(format!("{full_name}#{number}"))
    }

    /// Also exposes the `State` param type so ingress can request open issues
    /// without reaching into octocrab directly.
    pub fn open_state() -> State {
        State::Open
    }
}

fn parse_issue_id(id: &str) -> Result<(String, String, u64)> {
    let (repo_part, number_part) = id
        .rsplit_once('#')
        .ok_or_else(|| ProviderError::UnexpectedResponse(format!("malformed issue id: {id}")))?;
    let (owner, repo) = repo_part
        .split_once('/')
        .ok_or_else(|| ProviderError::UnexpectedResponse(format!("malformed issue id: {id}")))?;
    let number = number_part
        .parse()
        .map_err(|_| ProviderError::UnexpectedResponse(format!("malformed issue id: {id}")))?;
    Ok((owner.to_string(), repo.to_string(), number))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GitHubConfig {
        GitHubConfig {
            token: "t".into(),
            webhook_secret: "s".into(),
            trigger_label: "ai-attempt".into(),
            in_progress_label: "in-progress".into(),
            review_label: "review".into(),
            include_comments: true,
        }
    }

    #[tokio::test]
    async fn should_trigger_matches_labeled_event() {
        let provider = GitHubProvider::new(config()).unwrap();
        let event = json!({
            "action": "labeled",
            "label": {"name": "ai-attempt"},
            "issue": {"number": 42},
            "repository": {"full_name": "acme/widgets"}
        });
        assert_eq!(
            provider.should_trigger("issues", &event),
            Some("acme/widgets#42".to_string())
        );
    }

    #[tokio::test]
    async fn should_trigger_rejects_other_events() {
        let provider = GitHubProvider::new(config()).unwrap();
        let event = json!({
            "action": "labeled",
            "label": {"name": "ai-attempt"},
            "issue": {"number": 42},
            "repository": {"full_name": "acme/widgets"}
        });
        assert_eq!(provider.should_trigger("pull_request", &event), None);
    }

    #[tokio::test]
    async fn should_trigger_rejects_wrong_label() {
        let provider = GitHubProvider::new(config()).unwrap();
        let event = json!({
            "action": "labeled",
            "label": {"name": "bug"},
            "issue": {"number": 42},
            "repository": {"full_name": "acme/widgets"}
        });
        assert_eq!(provider.should_trigger("issues", &event), None);
    }

    #[test]
    fn parse_issue_id_roundtrip() {
        assert_eq!(
            parse_issue_id("acme/widgets#42").unwrap(),
            ("acme".to_string(), "widgets".to_string(), 42)
        );
        assert!(parse_issue_id("bad").is_err());
    }
}
