//! Slack Web API client implementing the capability traits.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    Channel, ChannelDirectory, ChannelPage, Message, MessagePoster, PostOutcome, RepliesPage,
    ThreadReference, ThreadReplies,
};
use crate::error::SlackApiError;

const PAGE_LIMIT: &str = "200";

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<Channel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ConversationsRepliesResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    has_more: bool,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChatPostMessageResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
    warning: Option<String>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackApiClient {
    pub fn new(api_base: &str, bot_token: &str, request_timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("escalation-bridge"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SlackApiError> {
        let response = request.bearer_auth(&self.bot_token).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SlackApiError::RateLimited {
                method: method.to_string(),
                retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::Status {
                method: method.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

fn api_error(method: &str, error: Option<String>) -> SlackApiError {
    SlackApiError::Api {
        method: method.to_string(),
        error: error.unwrap_or_else(|| "unknown error".to_string()),
    }
}

#[async_trait]
impl ChannelDirectory for SlackApiClient {
    async fn list_channels(&self, cursor: Option<String>) -> Result<ChannelPage, SlackApiError> {
        const METHOD: &str = "conversations.list";
        let mut query = vec![
            ("exclude_archived", "true".to_string()),
            ("types", "public_channel,private_channel".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response: ConversationsListResponse = self
            .send(METHOD, self.http.get(self.url(METHOD)).query(&query))
            .await?;
        if !response.ok {
            return Err(api_error(METHOD, response.error));
        }

        Ok(ChannelPage {
            channels: response.channels,
            next_cursor: response.response_metadata.and_then(|m| m.next_cursor),
        })
    }
}

#[async_trait]
impl ThreadReplies for SlackApiClient {
    async fn list_thread_replies(
        &self,
        thread: &ThreadReference,
        cursor: Option<String>,
    ) -> Result<RepliesPage, SlackApiError> {
        const METHOD: &str = "conversations.replies";
        let mut query = vec![
            ("channel", thread.channel_id.clone()),
            ("ts", thread.root_ts.clone()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response: ConversationsRepliesResponse = self
            .send(METHOD, self.http.get(self.url(METHOD)).query(&query))
            .await?;
        if !response.ok {
            return Err(api_error(METHOD, response.error));
        }

        Ok(RepliesPage {
            messages: response.messages,
            has_more: response.has_more,
            next_cursor: response.response_metadata.and_then(|m| m.next_cursor),
        })
    }
}

#[async_trait]
impl MessagePoster for SlackApiClient {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<PostOutcome, SlackApiError> {
        const METHOD: &str = "chat.postMessage";
        let payload = serde_json::json!({
            "channel": channel_id,
            "thread_ts": thread_ts,
            "text": text,
        });

        let response: ChatPostMessageResponse = self
            .send(METHOD, self.http.post(self.url(METHOD)).json(&payload))
            .await?;

        let metadata = response.response_metadata.unwrap_or_default();
        let diagnostics: Vec<String> = response
            .error
            .into_iter()
            .chain(response.warning)
            .chain(metadata.warnings)
            .chain(metadata.messages)
            .collect();

        Ok(PostOutcome {
            ok: response.ok,
            ts: response.ts,
            diagnostics: (!diagnostics.is_empty()).then(|| diagnostics.join("; ")),
        })
    }
}
