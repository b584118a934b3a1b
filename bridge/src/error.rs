//! Error types for the bridge.
//!
//! Request-scoped failures (`AuthError`, `ParseError`, `FetchError`,
//! `PostError`) are logged and mapped to an HTTP status or a log line.
//! `ResolveError` only happens at startup and is fatal there.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::slack::Message;

/// Inbound request failed signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A signature header is absent or the timestamp is not an integer.
    #[error("malformed signature headers: {0}")]
    Malformed(String),

    /// The request timestamp falls outside the allowed clock skew.
    #[error("stale request timestamp {timestamp} (now {now})")]
    Stale { timestamp: i64, now: i64 },

    /// The HMAC does not match the request.
    #[error("signature mismatch")]
    Mismatch,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
            AuthError::Stale { .. } | AuthError::Mismatch => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid event envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
}

/// Failure reported by the Slack Web API client.
#[derive(Error, Debug)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("slack {method} returned status {status}: {body}")]
    Status {
        method: String,
        status: u16,
        body: String,
    },

    #[error("slack {method} rate limited, retry after {retry_after:?}")]
    RateLimited {
        method: String,
        retry_after: Option<Duration>,
    },

    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("could not find channel name '{0}'")]
    NotFound(String),

    #[error("failed to list channels: {0}")]
    TransportFailure(#[source] SlackApiError),

    #[error("channel resolution cancelled")]
    Cancelled,
}

/// Thread retrieval failed part way. Messages gathered before the failure
/// are kept so callers can inspect them.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch thread replies after {} messages: {source}", .partial.len())]
    TransportFailure {
        partial: Vec<Message>,
        #[source]
        source: SlackApiError,
    },

    #[error("thread fetch cancelled after {} messages", .partial.len())]
    Cancelled { partial: Vec<Message> },
}

impl FetchError {
    pub fn partial(&self) -> &[Message] {
        match self {
            FetchError::TransportFailure { partial, .. } | FetchError::Cancelled { partial } => {
                partial
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    #[error("post message failed: {0}")]
    DeliveryFailed(String),
}

/// Failure reported by the ticket system.
#[derive(Error, Debug)]
pub enum TicketError {
    #[error("jira request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("jira rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum EscalationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("thread has no messages")]
    EmptyThread,

    #[error("failed to create issue: {0}")]
    Ticket(#[from] TicketError),

    #[error("issue {key} created but reply failed: {source}")]
    Reply {
        key: String,
        #[source]
        source: PostError,
    },

    #[error("escalation timed out after {0:?}")]
    TimedOut(Duration),
}
