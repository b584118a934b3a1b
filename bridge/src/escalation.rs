//! Deciding whether an inbound event escalates, and carrying it out:
//! fetch the thread, file the issue, reply with the link.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::dedup::RecentEvents;
use crate::error::EscalationError;
use crate::events::InboundEvent;
use crate::jira::{CreatedIssue, IssueCreator, TicketTemplate};
use crate::slack::{
    fetch_thread, post_to_thread, Message, MessagePoster, RoutingTable, ThreadReference,
    ThreadReplies,
};

#[derive(Debug, Clone)]
pub struct EscalationOptions {
    /// Upper bound for fetch + create + reply of a single event.
    pub deadline: Duration,
    pub dedup_capacity: usize,
    /// Post a notice into the thread when an issue could not be filed.
    pub notify_on_failure: bool,
}

impl Default for EscalationOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            dedup_capacity: 1024,
            notify_on_failure: true,
        }
    }
}

/// A matched trigger, ready to be escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub thread: ThreadReference,
    pub channel_name: String,
    pub reacting_user: String,
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Escalate(Escalation),
    Ignore(&'static str),
}

pub struct Escalator {
    routes: RoutingTable,
    threads: Arc<dyn ThreadReplies>,
    poster: Arc<dyn MessagePoster>,
    issues: Arc<dyn IssueCreator>,
    ticket: TicketTemplate,
    recent: RecentEvents,
    options: EscalationOptions,
}

impl Escalator {
    pub fn new(
        routes: RoutingTable,
        threads: Arc<dyn ThreadReplies>,
        poster: Arc<dyn MessagePoster>,
        issues: Arc<dyn IssueCreator>,
        ticket: TicketTemplate,
        options: EscalationOptions,
    ) -> Self {
        Self {
            routes,
            threads,
            poster,
            issues,
            ticket,
            recent: RecentEvents::with_capacity(options.dedup_capacity),
            options,
        }
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Match an event against the routing table. Only a `reaction_added`
    /// on a message whose channel and reaction both match a route, and that
    /// has not been seen recently, escalates.
    pub fn decide(&self, event_id: Option<&str>, event: &InboundEvent) -> Decision {
        let InboundEvent::ReactionAdded(reaction) = event else {
            return Decision::Ignore("not a reaction_added event");
        };
        let Some(thread) = reaction.thread() else {
            return Decision::Ignore("reaction is not on a message");
        };
        let Some(route) = self.routes.route_for(&thread.channel_id, &reaction.reaction) else {
            return Decision::Ignore("channel and reaction do not match a route");
        };

        let key = event_id.map(str::to_string).unwrap_or_else(|| {
            format!(
                "{}:{}:{}",
                thread.channel_id, thread.root_ts, reaction.reaction
            )
        });
        if !self.recent.first_delivery(&key) {
            return Decision::Ignore("duplicate delivery");
        }

        Decision::Escalate(Escalation {
            channel_name: route.channel_name.clone(),
            thread,
            reacting_user: reaction.user.clone(),
            event_id: event_id.map(str::to_string),
        })
    }

    /// Run an escalation to completion and log the outcome. Used from the
    /// background task spawned by the webhook handler.
    pub async fn dispatch(&self, escalation: Escalation, cancel: CancellationToken) {
        match self.run(&escalation, &cancel).await {
            Ok(issue) => tracing::info!(
                channel = %escalation.thread.channel_id,
                ts = %escalation.thread.root_ts,
                user = %escalation.reacting_user,
                key = %issue.key,
                url = %issue.url,
                "Escalated thread"
            ),
            Err(e) => tracing::error!(
                channel = %escalation.thread.channel_id,
                ts = %escalation.thread.root_ts,
                event_id = ?escalation.event_id,
                error = %e,
                "Escalation failed"
            ),
        }
    }

    pub async fn run(
        &self,
        escalation: &Escalation,
        cancel: &CancellationToken,
    ) -> Result<CreatedIssue, EscalationError> {
        tokio::time::timeout(self.options.deadline, self.escalate(escalation, cancel))
            .await
            .unwrap_or(Err(EscalationError::TimedOut(self.options.deadline)))
    }

    async fn escalate(
        &self,
        escalation: &Escalation,
        cancel: &CancellationToken,
    ) -> Result<CreatedIssue, EscalationError> {
        let thread = &escalation.thread;

        // A partial thread is not escalated; the error carries what was read.
        let messages = fetch_thread(self.threads.as_ref(), thread, cancel).await?;

        let issue = match self.file_issue(&escalation.channel_name, &messages).await {
            Ok(issue) => issue,
            Err(err) => {
                if self.options.notify_on_failure {
                    self.notify_failure(thread, &err).await;
                }
                return Err(err);
            }
        };

        let body = format!("{}: {}", issue.key, issue.url);
        post_to_thread(self.poster.as_ref(), &thread.channel_id, &thread.root_ts, &body)
            .await
            .map_err(|source| EscalationError::Reply {
                key: issue.key.clone(),
                source,
            })?;

        Ok(issue)
    }

    async fn file_issue(
        &self,
        channel_name: &str,
        messages: &[Message],
    ) -> Result<CreatedIssue, EscalationError> {
        let first = messages.first().ok_or(EscalationError::EmptyThread)?;
        let request = self.ticket.request_for(channel_name, first);
        Ok(self.issues.create_issue(&request).await?)
    }

    async fn notify_failure(&self, thread: &ThreadReference, err: &EscalationError) {
        let body = format!("Could not file a ticket for this thread: {}", err);
        if let Err(e) =
            post_to_thread(self.poster.as_ref(), &thread.channel_id, &thread.root_ts, &body).await
        {
            tracing::warn!(
                channel = %thread.channel_id,
                ts = %thread.root_ts,
                error = %e,
                "Failed to post failure notice"
            );
        }
    }
}
