pub mod error;
pub mod github;
pub mod linear;
pub mod signature;

use domain::{Issue, ProviderTag, StatusPhase};
use serde_json::Value;

pub use error::{ProviderError, Result};
pub use github::{GitHubConfig, GitHubProvider};
pub use linear::{LinearConfig, LinearProvider};

/// A tagged variant with a single capability set. The provider's identity
/// never needs to escape this enum beyond the `ProviderTag` carried on a
/// `Task` and the dispatch below and in ingress.
pub enum Provider {
    Linear(LinearProvider),
    GitHub(GitHubProvider),
}

impl Provider {
    pub fn tag(&self) -> ProviderTag {
        match self {
            Provider::Linear(_) => ProviderTag::Linear,
            Provider::GitHub(_) => ProviderTag::GitHub,
        }
    }

    pub async fn get_issue(&self, id: &str) -> Result<Issue> {
        match self {
            Provider::Linear(p) => p.get_issue(id).await,
            Provider::GitHub(p) => p.get_issue(id).await,
        }
    }

    pub async fn update_status(&self, issue_id: &str, phase: StatusPhase) -> Result<()> {
        match self {
            Provider::Linear(p) => p.update_status(issue_id, phase).await,
            Provider::GitHub(p) => p.update_status(issue_id, phase).await,
        }
    }

    pub async fn add_comment(&self, issue_id: &str, markdown: &str) -> Result<()> {
        match self {
            Provider::Linear(p) => p.add_comment(issue_id, markdown).await,
            Provider::GitHub(p) => p.add_comment(issue_id, markdown).await,
        }
    }

    pub fn get_repository(&self, issue: &Issue) -> Option<String> {
        match self {
            Provider::Linear(_) => LinearProvider::get_repository(issue),
            Provider::GitHub(_) => GitHubProvider::get_repository(issue),
        }
    }

    pub fn get_branch_name(&self, issue: &Issue) -> Result<String> {
        match self {
            Provider::Linear(_) => Ok(LinearProvider::get_branch_name(issue)),
            Provider::GitHub(_) => GitHubProvider::get_branch_name(issue),
        }
    }

    pub fn verify_webhook(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool {
        match self {
            Provider::Linear(p) => p.verify_webhook(raw_body, signature_header),
            Provider::GitHub(p) => p.verify_webhook(raw_body, signature_header),
        }
    }
}

/// Process-wide registry of configured providers. At most one entry per
/// tag; a tag absent from the registry means that provider was not
/// configured (missing env credentials), yielding `NotConfigured` at
/// ingress rather than a panic.
#[derive(Default)]
pub struct ProviderRegistry {
    linear: Option<Provider>,
    github: Option<Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linear(mut self, config: LinearConfig) -> Self {
        self.linear = Some(Provider::Linear(LinearProvider::new(config)));
        self
    }

    pub fn with_github(mut self, config: GitHubConfig) -> error::Result<Self> {
        self.github = Some(Provider::GitHub(GitHubProvider::new(config)?));
        Ok(self)
    }

    pub fn get(&self, tag: ProviderTag) -> Option<&Provider> {
        match tag {
            ProviderTag::Linear => self.linear.as_ref(),
            ProviderTag::GitHub => self.github.as_ref(),
        }
    }

    pub fn configured_tags(&self) -> Vec<ProviderTag> {
        let mut tags = Vec::new();
        if self.linear.is_some() {
            tags.push(ProviderTag::Linear);
        }
        if self.github.is_some() {
            tags.push(ProviderTag::GitHub);
        }
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_none() && self.github.is_none()
    }
}

/// GitHub's webhook filter additionally needs the `X-GitHub-Event` header,
/// which ingress extracts and passes alongside the raw JSON body.
pub fn github_should_trigger(provider: &Provider, event_name: &str, event: &Value) -> Option<String> {
    match provider {
        Provider::GitHub(p) => p.should_trigger(event_name, event),
        Provider::Linear(_) => None,
    }
}

pub fn linear_should_trigger(provider: &Provider, event: &Value) -> Option<String> {
    match provider {
        Provider::Linear(p) => p.should_trigger(event),
        Provider::GitHub(_) => None,
    }
}
