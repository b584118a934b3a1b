pub mod client;

use axum::async_trait;

use crate::error::TicketError;
use crate::slack::Message;

pub use client::JiraClient;

const SUMMARY_LINE_LIMIT: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    pub project_key: String,
    pub issue_type: String,
    pub summary: String,
    pub description: String,
    pub reporter_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub key: String,
    pub url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueCreator: Send + Sync {
    async fn create_issue(&self, request: &TicketRequest) -> Result<CreatedIssue, TicketError>;
}

/// Static issue fields from configuration. Combined with the first message
/// of a thread to produce a [`TicketRequest`].
#[derive(Debug, Clone)]
pub struct TicketTemplate {
    pub project_key: String,
    pub issue_type: String,
    /// Supports `{channel}` and `{first_line}` placeholders.
    pub summary_template: String,
    pub reporter_id: String,
}

impl TicketTemplate {
    pub fn request_for(&self, channel_name: &str, first: &Message) -> TicketRequest {
        TicketRequest {
            project_key: self.project_key.clone(),
            issue_type: self.issue_type.clone(),
            summary: self.render_summary(channel_name, &first.text),
            description: first.text.clone(),
            reporter_id: self.reporter_id.clone(),
        }
    }

    fn render_summary(&self, channel_name: &str, text: &str) -> String {
        let first_line = first_line(text);
        let summary = self
            .summary_template
            .replace("{channel}", channel_name)
            .replace("{first_line}", &first_line);
        // Jira rejects summaries containing line breaks
        summary.replace(['\r', '\n'], " ").trim().to_string()
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() > SUMMARY_LINE_LIMIT {
        let truncated: String = line.chars().take(SUMMARY_LINE_LIMIT - 1).collect();
        format!("{}…", truncated)
    } else {
        line.to_string()
    }
}
