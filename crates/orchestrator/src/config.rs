use std::path::PathBuf;
use std::time::Duration;

use providers::{GitHubConfig, LinearConfig};

/// Everything read from the environment at boot, validated once. Startup
/// fails with a descriptive error rather than panicking on a bad value.
pub struct Config {
    pub linear: Option<LinearConfig>,
    pub github: Option<GitHubConfig>,
    pub repos_base_path: PathBuf,
    pub worktrees_path: PathBuf,
    pub max_concurrent_agents: usize,
    pub agent_timeout: Duration,
    pub port: u16,
    pub auto_clean_orphans: bool,
    pub agent_binary: String,
    pub code_host_cli: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let linear = linear_config_from_env();
        let github = github_config_from_env()?;

        if linear.is_none() && github.is_none() {
            anyhow::bail!(
                "no provider is configured: set LINEAR_API_KEY+LINEAR_WEBHOOK_SECRET or GITHUB_TOKEN+GITHUB_WEBHOOK_SECRET"
            );
        }

        let repos_base_path = required_path("REPOS_BASE_PATH")?;
        let worktrees_path = required_path("WORKTREES_PATH")?;

        let max_concurrent_agents = env_or("MAX_CONCURRENT_AGENTS", 1usize)?;
        let agent_timeout_ms = env_or("AGENT_TIMEOUT", 1_800_000u64)?;
        let port = env_or("PORT", 3847u16)?;
        let auto_clean_orphans = env_bool_or("AUTO_CLEAN_ORPHANS", false);
        let agent_binary = std::env::var("AGENT_BINARY").unwrap_or_else(|_| "claude".to_string());
        let code_host_cli = std::env::var("CODE_HOST_CLI").unwrap_or_else(|_| "gh".to_string());

        Ok(Self {
            linear,
            github,
            repos_base_path,
            worktrees_path,
            max_concurrent_agents,
            agent_timeout: Duration::from_millis(agent_timeout_ms),
            port,
            auto_clean_orphans,
            agent_binary,
            code_host_cli,
        })
    }
}

fn linear_config_from_env() -> Option<LinearConfig> {
    let api_key = std::env::var("LINEAR_API_KEY").ok()?;
    let webhook_secret = std::env::var("LINEAR_WEBHOOK_SECRET").ok()?;
    Some(LinearConfig {
        api_key,
        webhook_secret,
        trigger_label: std::env::var("LINEAR_TRIGGER_LABEL").unwrap_or_else(|_| "ai-attempt".into()),
        repo_custom_field_name: std::env::var("REPO_CUSTOM_FIELD_NAME")
            .unwrap_or_else(|_| "Repository".into()),
        in_progress_status: std::env::var("IN_PROGRESS_STATUS")
            .unwrap_or_else(|_| "In Progress".into()),
        review_status: std::env::var("REVIEW_STATUS").unwrap_or_else(|_| "In Review".into()),
        include_comments: env_bool_or("INCLUDE_COMMENTS", true),
    })
}

fn github_config_from_env() -> anyhow::Result<Option<GitHubConfig>> {
    let (token, webhook_secret) = match (
        std::env::var("GITHUB_TOKEN").ok(),
        std::env::var("GITHUB_WEBHOOK_SECRET").ok(),
    ) {
        (Some(t), Some(s)) => (t, s),
        (None, None) => return Ok(None),
        _ => anyhow::bail!("GITHUB_TOKEN and GITHUB_WEBHOOK_SECRET must be set together"),
    };
    Ok(Some(GitHubConfig {
        token,
        webhook_secret,
        trigger_label: std::env::var("GITHUB_TRIGGER_LABEL").unwrap_or_else(|_| "ai-attempt".into()),
        in_progress_label: std::env::var("GITHUB_IN_PROGRESS_LABEL")
            .unwrap_or_else(|_| "in-progress".into()),
        review_label: std::env::var("GITHUB_REVIEW_LABEL").unwrap_or_else(|_| "review".into()),
        include_comments: env_bool_or("INCLUDE_COMMENTS", true),
    }))
}

fn required_path(name: &str) -> anyhow::Result<PathBuf> {
    let path = std::env::var(name)
        .map(PathBuf::from)
        .map_err(|_| anyhow::anyhow!("{name} is required"))?;
    if !path.is_dir() {
        anyhow::bail!("{name} ('{}') does not exist or is not a directory", path.display());
    }
    Ok(path)
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid {name} value '{value}': {err}")),
        Err(_) => Ok(default),
    }
}

fn env_bool_or(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default_when_unset() {
        // SAFETY: test-only mutation of the process environment, reverted immediately.
        unsafe { std::env::remove_var("ORCHESTRATOR_TEST_UNSET_VAR") };
        let value: u16 = env_or("ORCHESTRATOR_TEST_UNSET_VAR", 99).unwrap();
        assert_eq!(value, 99);
    }

    #[test]
    fn env_or_rejects_unparsable_value() {
        unsafe { std::env::set_var("ORCHESTRATOR_TEST_BAD_PORT", "not-a-number") };
        let result: anyhow::Result<u16> = env_or("ORCHESTRATOR_TEST_BAD_PORT", 3847);
        unsafe { std::env::remove_var("ORCHESTRATOR_TEST_BAD_PORT") };
        assert!(result.is_err());
    }

    #[test]
    fn env_bool_or_accepts_common_truthy_values() {
        unsafe { std::env::set_var("ORCHESTRATOR_TEST_FLAG", "YES") };
        assert!(env_bool_or("ORCHESTRATOR_TEST_FLAG", false));
        unsafe { std::env::remove_var("ORCHESTRATOR_TEST_FLAG") };
    }

    #[test]
    fn required_path_errors_when_missing() {
        unsafe { std::env::remove_var("ORCHESTRATOR_TEST_MISSING_PATH") };
        assert!(required_path("ORCHESTRATOR_TEST_MISSING_PATH").is_err());
    }
}
