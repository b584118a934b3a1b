// Common test utilities: in-memory Slack and Jira doubles plus request helpers
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::async_trait;
use axum::body::Body;
use axum::http::Request;

use escalation_bridge::crypto::{self, SigningContext, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use escalation_bridge::error::{SlackApiError, TicketError};
use escalation_bridge::escalation::{EscalationOptions, Escalator};
use escalation_bridge::jira::{CreatedIssue, IssueCreator, TicketRequest, TicketTemplate};
use escalation_bridge::slack::{
    Message, MessagePoster, PostOutcome, RepliesPage, RoutingTable, ThreadReference,
    ThreadReplies,
};
use escalation_bridge::AppState;

pub const SIGNING_SECRET: &str = "test_signing_secret_abc123";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub channel: String,
    pub thread_ts: String,
    pub text: String,
}

/// Serves a fixed thread in a single page and records every call.
#[derive(Default)]
pub struct FakeSlack {
    pub thread: Vec<Message>,
    pub reply_calls: Mutex<Vec<ThreadReference>>,
    pub posts: Mutex<Vec<Post>>,
}

impl FakeSlack {
    pub fn with_thread(texts: &[&str]) -> Self {
        let thread = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Message {
                ts: format!("1000.{}", i + 1),
                user: "U1".to_string(),
                text: text.to_string(),
            })
            .collect();
        Self {
            thread,
            ..Default::default()
        }
    }

    pub fn outbound_calls(&self) -> usize {
        self.reply_calls.lock().unwrap().len() + self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl ThreadReplies for FakeSlack {
    async fn list_thread_replies(
        &self,
        thread: &ThreadReference,
        _cursor: Option<String>,
    ) -> Result<RepliesPage, SlackApiError> {
        self.reply_calls.lock().unwrap().push(thread.clone());
        Ok(RepliesPage {
            messages: self.thread.clone(),
            has_more: false,
            next_cursor: None,
        })
    }
}

#[async_trait]
impl MessagePoster for FakeSlack {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<PostOutcome, SlackApiError> {
        self.posts.lock().unwrap().push(Post {
            channel: channel_id.to_string(),
            thread_ts: thread_ts.to_string(),
            text: text.to_string(),
        });
        Ok(PostOutcome {
            ok: true,
            ts: Some("1000.9".to_string()),
            diagnostics: None,
        })
    }
}

/// Hands out sequential issue keys in project TEST, starting at `next`.
pub struct FakeJira {
    next: AtomicUsize,
    pub requests: Mutex<Vec<TicketRequest>>,
}

impl FakeJira {
    pub fn starting_at(next: usize) -> Self {
        Self {
            next: AtomicUsize::new(next),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IssueCreator for FakeJira {
    async fn create_issue(&self, request: &TicketRequest) -> Result<CreatedIssue, TicketError> {
        self.requests.lock().unwrap().push(request.clone());
        let key = format!("TEST-{}", self.next.fetch_add(1, Ordering::SeqCst));
        Ok(CreatedIssue {
            url: format!("https://jira.example.com/browse/{}", key),
            key,
        })
    }
}

/// Routing table from `(channel_id, channel_name, emoji)` triples.
pub fn routing_table(routes: &[(&str, &str, &str)]) -> RoutingTable {
    let ids: HashMap<String, String> = routes
        .iter()
        .map(|(id, name, _)| (name.to_string(), id.to_string()))
        .collect();
    let emojis: BTreeMap<String, String> = routes
        .iter()
        .map(|(_, name, emoji)| (name.to_string(), emoji.to_string()))
        .collect();
    RoutingTable::from_resolved(&ids, &emojis).expect("routing table")
}

pub fn signing_context() -> SigningContext {
    SigningContext::new(SIGNING_SECRET, Duration::from_secs(300))
}

pub fn app_state(
    routes: RoutingTable,
    slack: Arc<FakeSlack>,
    jira: Arc<FakeJira>,
) -> Arc<AppState> {
    let escalator = Escalator::new(
        routes,
        slack.clone(),
        slack,
        jira,
        TicketTemplate {
            project_key: "TEST".to_string(),
            issue_type: "Bug".to_string(),
            summary_template: "Escalated from #{channel}: {first_line}".to_string(),
            reporter_id: "some-account-id".to_string(),
        },
        EscalationOptions::default(),
    );
    Arc::new(AppState::new(signing_context(), escalator))
}

/// A POST to /slack/events signed with the test secret at the current time.
pub fn signed_request(body: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature =
        crypto::sign(&signing_context(), &timestamp, body.as_bytes()).expect("signature");
    Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("content-type", "application/json")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Wait for every escalation spawned so far to finish.
pub async fn settle(state: &AppState) {
    state.tasks.close();
    state.tasks.wait().await;
}

pub fn reaction_payload(channel: &str, ts: &str, reaction: &str, event_id: &str) -> String {
    serde_json::json!({
        "token": "il5E6WOsnDv5rEcLcp0ftogS",
        "team_id": "TCJPJ3FAP",
        "api_app_id": "A02NU1FNPGX",
        "event": {
            "type": "reaction_added",
            "user": "UCJLPB2AG",
            "item": { "type": "message", "channel": channel, "ts": ts },
            "reaction": reaction,
            "item_user": "UCJLPB2AG",
            "event_ts": "1641160720.000300"
        },
        "type": "event_callback",
        "event_id": event_id,
        "event_time": 1641160720
    })
    .to_string()
}
