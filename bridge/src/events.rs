//! Slack Events API payloads.
//!
//! Only `url_verification` and `event_callback` envelopes and the
//! `reaction_added` inner event are modelled; everything else parses to an
//! inert variant so unknown payloads are still acknowledged.

use serde::Deserialize;

use crate::error::ParseError;
use crate::slack::ThreadReference;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// One-time handshake when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback {
        /// Unique per event; repeated when Slack retries a delivery.
        event_id: Option<String>,
        event: InboundEvent,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    ReactionAdded(ReactionAdded),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionAdded {
    /// User who added the reaction.
    pub user: String,
    pub reaction: String,
    pub item: ReactionItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionItem {
    Message { channel: String, ts: String },
    /// Reactions on files and file comments carry no thread.
    #[serde(other)]
    Other,
}

impl ReactionAdded {
    /// The thread the reacted-to message belongs to, if the item is a message.
    pub fn thread(&self) -> Option<ThreadReference> {
        match &self.item {
            ReactionItem::Message { channel, ts } => {
                Some(ThreadReference::new(channel.clone(), ts.clone()))
            }
            ReactionItem::Other => None,
        }
    }
}

pub fn parse_envelope(body: &[u8]) -> Result<Envelope, ParseError> {
    Ok(serde_json::from_slice(body)?)
}
