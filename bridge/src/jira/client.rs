use std::time::Duration;

use anyhow::{Context, Result};
use axum::async_trait;
use serde::Deserialize;

use super::{CreatedIssue, IssueCreator, TicketRequest};
use crate::error::TicketError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyselfResponse {
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateIssueResponse {
    key: String,
}

/// Jira Cloud REST v2 client using basic auth (user + API token).
#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        username: &str,
        api_token: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to create jira client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    /// Account ID of the authenticated user, used as the issue reporter.
    pub async fn current_account_id(&self) -> Result<String, TicketError> {
        let response = self
            .http
            .get(format!("{}/rest/api/2/myself", self.base_url))
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TicketError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let myself: MyselfResponse = response.json().await?;
        Ok(myself.account_id)
    }
}

#[async_trait]
impl IssueCreator for JiraClient {
    async fn create_issue(&self, request: &TicketRequest) -> Result<CreatedIssue, TicketError> {
        let payload = serde_json::json!({
            "fields": {
                "project": { "key": request.project_key },
                "summary": request.summary,
                "description": request.description,
                "issuetype": { "name": request.issue_type },
                "reporter": { "accountId": request.reporter_id },
            }
        });

        let response = self
            .http
            .post(format!("{}/rest/api/2/issue", self.base_url))
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Jira rejected issue");
            return Err(TicketError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateIssueResponse = response.json().await?;
        Ok(CreatedIssue {
            url: self.browse_url(&created.key),
            key: created.key,
        })
    }
}
