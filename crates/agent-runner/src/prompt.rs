//! Prompt construction. Section ordering and headings are part of the
//! contract — downstream tooling may rely on them — so this stays a plain
//! function building a fixed section list rather than a templating layer.

use domain::Issue;

const REQUIREMENTS: &str = "## Requirements\n\
- Make the minimal set of changes needed to resolve the issue above.\n\
- Follow the conventions already established in the surrounding code.\n\
- Add or update tests when the change affects observable behavior.\n\
- Do not touch unrelated files.\n\
- Your output will be committed and pushed on your behalf; leave the working tree in a state you would be comfortable shipping.";

pub fn build_prompt(issue: &Issue, identifier: &str, repo: &str, branch: &str) -> String {
    let mut sections = Vec::new();

    sections.push(format!("You are working on: {}", issue.title));

    sections.push(format!(
        "Issue: {identifier}\nRepository: {repo}\nBranch: {branch}"
    ));

    if let Some(description) = &issue.description {
        if !description.trim().is_empty() {
            sections.push(format!("## Description\n{description}"));
        }
    }

    if let Some(parent) = &issue.parent {
        let mut block = format!("## Parent Issue Context\n{}: {}", parent.identifier, parent.title);
        if let Some(description) = &parent.description {
            if !description.trim().is_empty() {
                block.push('\n');
                block.push_str(description);
            }
        }
        sections.push(block);
    }

    if !issue.labels.is_empty() {
        let bullets = issue
            .labels
            .iter()
            .map(|l| format!("- {}", l.name))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("## Labels\n{bullets}"));
    }

    if !issue.comments.is_empty() {
        let lines = issue
            .comments
            .iter()
            .map(|c| {
                let author = c.author.as_deref().unwrap_or("unknown");
                let date = c.created_at.format("%Y-%m-%d %H:%M");
                format!("**{author}** ({date}):\n{}", c.body)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("## Discussion\n{lines}"));
    }

    sections.push(REQUIREMENTS.to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Comment, Label, ParentIssue};

    fn base_issue() -> Issue {
        Issue {
            id: "i1".into(),
            identifier: "ENG-7".into(),
            title: "Fix crash".into(),
            description: None,
            labels: Vec::new(),
            comments: Vec::new(),
            parent: None,
            repository_hint: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn omits_empty_sections() {
        let issue = base_issue();
        let prompt = build_prompt(&issue, "ENG-7", "my-proj", "ENG-7");
        assert!(prompt.contains("You are working on: Fix crash"));
        assert!(!prompt.contains("## Description"));
        assert!(!prompt.contains("## Labels"));
        assert!(!prompt.contains("## Discussion"));
        assert!(prompt.contains("## Requirements"));
    }

    #[test]
    fn includes_populated_sections_in_order() {
        let mut issue = base_issue();
        issue.description = Some("Crashes on startup".into());
        issue.labels = vec![Label {
            id: "l1".into(),
            name: "bug".into(),
        }];
        issue.parent = Some(ParentIssue {
            identifier: "ENG-1".into(),
            title: "Epic".into(),
            description: None,
        });
        issue.comments = vec![Comment {
            id: "c1".into(),
            body: "Repro steps attached".into(),
            created_at: Utc::now(),
            author: Some("alice".into()),
        }];

        let prompt = build_prompt(&issue, "ENG-7", "my-proj", "ENG-7");
        let description_pos = prompt.find("## Description").unwrap();
        let parent_pos = prompt.find("## Parent Issue Context").unwrap();
        let labels_pos = prompt.find("## Labels").unwrap();
        let discussion_pos = prompt.find("## Discussion").unwrap();
        let requirements_pos = prompt.find("## Requirements").unwrap();

        assert!(description_pos < parent_pos);
        assert!(parent_pos < labels_pos);
        assert!(labels_pos < discussion_pos);
        assert!(discussion_pos < requirements_pos);
        assert!(prompt.contains("**alice**"));
    }
}
