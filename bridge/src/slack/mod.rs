//! Slack side of the bridge: the capability traits the core depends on,
//! the paginating helpers built on top of them, and the Web API client.

pub mod channels;
pub mod client;
pub mod reply;
pub mod threads;

use axum::async_trait;
use serde::Deserialize;

use crate::error::SlackApiError;

pub use channels::{build_routing_table, resolve_channel_ids, ChannelRoute, RoutingTable};
pub use client::SlackApiClient;
pub use reply::post_to_thread;
pub use threads::fetch_thread;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

/// One page of `conversations.list`.
#[derive(Debug, Clone, Default)]
pub struct ChannelPage {
    pub channels: Vec<Channel>,
    /// Empty or absent on the last page.
    pub next_cursor: Option<String>,
}

/// Identifies a thread by its channel and the `ts` of the root message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadReference {
    pub channel_id: String,
    pub root_ts: String,
}

impl ThreadReference {
    pub fn new(channel_id: impl Into<String>, root_ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            root_ts: root_ts.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub ts: String,
    /// Bot messages carry `bot_id` instead of `user`.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
}

/// One page of `conversations.replies`.
#[derive(Debug, Clone, Default)]
pub struct RepliesPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Result of `chat.postMessage` as reported by Slack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    pub ok: bool,
    pub ts: Option<String>,
    /// Slack's `error` plus any `response_metadata` warnings.
    pub diagnostics: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// List non-archived channels, starting at `cursor` (first page when `None`).
    async fn list_channels(&self, cursor: Option<String>) -> Result<ChannelPage, SlackApiError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThreadReplies: Send + Sync {
    async fn list_thread_replies(
        &self,
        thread: &ThreadReference,
        cursor: Option<String>,
    ) -> Result<RepliesPage, SlackApiError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<PostOutcome, SlackApiError>;
}

/// Returns the cursor only when it points at another page.
pub(crate) fn non_empty_cursor(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.trim().is_empty())
}
