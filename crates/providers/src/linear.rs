//! GraphQL-style hosted tracker adapter (Linear).

use chrono::{DateTime, Utc};
use domain::{Comment, Issue, Label, ParentIssue, StatusPhase};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ProviderError, Result};
use crate::signature;

const GRAPHQL_URL: &str = "https://api.linear.app/graphql";

#[derive(Debug, Clone)]
pub struct LinearConfig {
    pub api_key: String,
    pub webhook_secret: String,
    pub trigger_label: String,
    pub repo_custom_field_name: String,
    pub in_progress_status: String,
    pub review_status: String,
    pub include_comments: bool,
}

pub struct LinearProvider {
    config: LinearConfig,
    client: Client,
}

impl LinearProvider {
    pub fn new(config: LinearConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .client
            .post(GRAPHQL_URL)
            .header("Authorization", &self.config.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(ProviderError::UnexpectedResponse(format!(
                "linear graphql errors: {errors}"
            )));
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| ProviderError::UnexpectedResponse("missing data field".into()))
    }

    pub async fn get_issue(&self, id: &str) -> Result<Issue> {
        const QUERY: &str = r#"
            query Issue($id: String!) {
                issue(id: $id) {
                    id
                    identifier
                    title
                    description
                    labels { nodes { id name } }
                    comments { nodes { id body createdAt user { name } } }
                    parent { identifier title description }
                    team { id name states { nodes { id name } } }
                    attachments { nodes { title subtitle url } }
                }
            }
        "#;

        let data = self.graphql(QUERY, json!({ "id": id })).await?;
        let raw = data
            .get("issue")
            .filter(|v| !v.is_null())
            .ok_or(ProviderError::NotFound)?;

        #[derive(Deserialize)]
        struct RawLabelNodes {
            nodes: Vec<Label>,
        }
        #[derive(Deserialize)]
        struct RawUser {
            name: Option<String>,
        }
        #[derive(Deserialize)]
        struct RawComment {
            id: String,
            body: String,
            #[serde(rename = "createdAt")]
            created_at: DateTime<Utc>,
            user: Option<RawUser>,
        }
        #[derive(Deserialize)]
        struct RawCommentNodes {
            nodes: Vec<RawComment>,
        }
        #[derive(Deserialize)]
        struct RawParent {
            identifier: String,
            title: String,
            description: Option<String>,
        }
        #[derive(Deserialize)]
        struct RawIssue {
            id: String,
            identifier: String,
            title: String,
            description: Option<String>,
            labels: RawLabelNodes,
            comments: RawCommentNodes,
            parent: Option<RawParent>,
        }

        let parsed: RawIssue = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let mut comments: Vec<Comment> = parsed
            .comments
            .nodes
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                body: c.body,
                created_at: c.created_at,
                author: c.user.and_then(|u| u.name),
            })
            .collect();
        comments.sort_by_key(|c| c.created_at);
        if !self.config.include_comments {
            comments.clear();
        }

        let repository_hint = Self::extract_repository_hint(
            raw.get("attachments"),
            &self.config.repo_custom_field_name,
        );

        Ok(Issue {
            id: parsed.id,
            identifier: parsed.identifier,
            title: parsed.title,
            description: parsed.description,
            labels: parsed.labels.nodes,
            comments,
            parent: parsed.parent.map(|p| ParentIssue {
                identifier: p.identifier,
                title: p.title,
                description: p.description,
            }),
            repository_hint,
            metadata: raw.clone(),
        })
    }

    /// Linear has no first-class "custom field" concept on issues in the
    /// public API; the repository is modeled here as a named attachment
    /// (title == the configured field name, value in `subtitle`/`url`).
    fn extract_repository_hint(attachments: Option<&Value>, field_name: &str) -> Option<String> {
        let nodes = attachments?.get("nodes")?.as_array()?;
        nodes.iter().find_map(|node| {
            let title = node.get("title")?.as_str()?;
            if !title.eq_ignore_ascii_case(field_name) {
                return None;
            }
            node.get("subtitle")
                .and_then(Value::as_str)
                .or_else(|| node.get("url").and_then(Value::as_str))
                .map(str::to_string)
        })
    }

    pub fn get_repository(issue: &Issue) -> Option<String> {
        issue.repository_hint.clone()
    }

    pub fn get_branch_name(issue: &Issue) -> String {
        issue.identifier.clone()
    }

    pub async fn update_status(&self, issue_id: &str, phase: StatusPhase) -> Result<()> {
        let wanted = match phase {
            StatusPhase::InProgress => &self.config.in_progress_status,
            StatusPhase::Review => &self.config.review_status,
        };

        const TEAM_QUERY: &str = r#"
            query IssueTeam($id: String!) {
                issue(id: $id) { team { states { nodes { id name } } } }
            }
        "#;
        let data = self.graphql(TEAM_QUERY, json!({ "id": issue_id })).await?;
        let states = data
            .pointer("/issue/team/states/nodes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let state_id = states
            .iter()
            .find(|s| {
                s.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            })
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str);

        let Some(state_id) = state_id else {
            let available = states
                .iter()
                .filter_map(|s| s.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ProviderError::StateNotFound {
                wanted: wanted.clone(),
                available,
            });
        };

        const MUTATION: &str = r#"
            mutation UpdateIssue($id: String!, $stateId: String!) {
                issueUpdate(id: $id, input: { stateId: $stateId }) { success }
            }
        "#;
        self.graphql(
            MUTATION,
            json!({ "id": issue_id, "stateId": state_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn add_comment(&self, issue_id: &str, markdown: &str) -> Result<()> {
        const MUTATION: &str = r#"
            mutation AddComment($issueId: String!, $body: String!) {
                commentCreate(input: { issueId: $issueId, body: $body }) { success }
            }
        "#;
        self.graphql(
            MUTATION,
            json!({ "issueId": issue_id, "body": markdown }),
        )
        .await?;
        Ok(())
    }

    pub fn verify_webhook(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool {
        match signature_header {
            Some(header) => signature::verify_hex_digest(raw_body, &self.config.webhook_secret, header),
            None => false,
        }
    }

    /// Returns `Some(issue_id)` when the webhook payload represents the
    /// trigger label being added to an issue.
    pub fn should_trigger(&self, event: &Value) -> Option<String> {
        if event.get("type").and_then(Value::as_str) != Some("Issue") {
            return None;
        }
        if event.get("action").and_then(Value::as_str) != Some("update") {
            return None;
        }

        let current = event
            .pointer("/data/labelIds")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        let previous = event
            .pointer("/updatedFrom/labelIds")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        let added: Vec<&str> = current
            .into_iter()
            .filter(|id| !previous.contains(id))
            .collect();
        if added.is_empty() {
            return None;
        }

        let label_names = event
            .pointer("/data/labels")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let matched = added.iter().any(|id| {
            label_names.iter().any(|l| {
                l.get("id").and_then(Value::as_str) == Some(id)
                    && l.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.eq_ignore_ascii_case(&self.config.trigger_label))
            })
        });
        if !matched {
            return None;
        }

        event
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinearConfig {
        LinearConfig {
            api_key: "k".into(),
            webhook_secret: "s".into(),
            trigger_label: "ai-attempt".into(),
            repo_custom_field_name: "Repository".into(),
            in_progress_status: "In Progress".into(),
            review_status: "In Review".into(),
            include_comments: true,
        }
    }

    #[test]
    fn should_trigger_matches_added_label() {
        let provider = LinearProvider::new(config());
        let event = json!({
            "type": "Issue",
            "action": "update",
            "data": {
                "id": "abc-123",
                "labelIds": ["L1"],
                "labels": [{"id": "L1", "name": "ai-attempt"}]
            },
            "updatedFrom": { "labelIds": [] }
        });
        assert_eq!(provider.should_trigger(&event), Some("abc-123".to_string()));
    }

    #[test]
    fn should_trigger_ignores_unrelated_label() {
        let provider = LinearProvider::new(config());
        let event = json!({
            "type": "Issue",
            "action": "update",
            "data": {
                "id": "abc-123",
                "labelIds": ["L1"],
                "labels": [{"id": "L1", "name": "bug"}]
            },
            "updatedFrom": { "labelIds": [] }
        });
        assert_eq!(provider.should_trigger(&event), None);
    }

    #[test]
    fn should_trigger_ignores_empty_diff() {
        let provider = LinearProvider::new(config());
        let event = json!({
            "type": "Issue",
            "action": "update",
            "data": { "id": "abc-123", "labelIds": ["L1"], "labels": [] },
            "updatedFrom": { "labelIds": ["L1"] }
        });
        assert_eq!(provider.should_trigger(&event), None);
    }

    #[test]
    fn extract_repository_hint_matches_by_title() {
        let attachments = json!({
            "nodes": [
                {"title": "repository", "subtitle": "my-proj", "url": null}
            ]
        });
        assert_eq!(
            LinearProvider::extract_repository_hint(Some(&attachments), "Repository"),
            Some("my-proj".to_string())
        );
    }
}
