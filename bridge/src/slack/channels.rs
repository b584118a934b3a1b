//! Channel name resolution and the channel → trigger emoji routing table.
//!
//! Resolution walks `conversations.list` once at startup. The resulting
//! table is immutable and shared read-only with request handlers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio_util::sync::CancellationToken;

use super::{non_empty_cursor, ChannelDirectory};
use crate::error::ResolveError;

/// Resolve every name in `names` to its channel ID.
///
/// Pages are requested sequentially and the scan stops as soon as every
/// name has been found, or after the last page (empty cursor).
pub async fn resolve_channel_ids(
    directory: &dyn ChannelDirectory,
    names: &BTreeSet<String>,
    cancel: &CancellationToken,
) -> Result<HashMap<String, String>, ResolveError> {
    let mut pending = names.clone();
    let mut resolved = HashMap::with_capacity(names.len());
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    while !pending.is_empty() {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        let page = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            page = directory.list_channels(cursor.take()) => {
                page.map_err(ResolveError::TransportFailure)?
            }
        };
        pages += 1;

        for channel in page.channels {
            if pending.remove(&channel.name) {
                tracing::debug!(name = %channel.name, id = %channel.id, "Resolved channel");
                resolved.insert(channel.name, channel.id);
            }
        }

        match non_empty_cursor(page.next_cursor) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    if let Some(missing) = pending.into_iter().next() {
        tracing::error!(name = %missing, pages, "Channel not found after scanning all pages");
        return Err(ResolveError::NotFound(missing));
    }

    tracing::info!(channels = resolved.len(), pages, "Resolved monitored channels");
    Ok(resolved)
}

/// A monitored channel and the reaction that escalates its threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRoute {
    pub channel_id: String,
    pub channel_name: String,
    pub trigger_emoji: String,
}

/// Channel ID → trigger emoji, keyed by unique channel ID.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, ChannelRoute>,
}

impl RoutingTable {
    /// Join the resolved name → ID table with the configured name → emoji
    /// table. An emoji configured for a name that did not resolve is a
    /// configuration error.
    pub fn from_resolved(
        ids_by_name: &HashMap<String, String>,
        emojis_by_name: &BTreeMap<String, String>,
    ) -> Result<Self, ResolveError> {
        let mut routes = HashMap::with_capacity(emojis_by_name.len());
        for (name, emoji) in emojis_by_name {
            let channel_id = ids_by_name
                .get(name)
                .ok_or_else(|| ResolveError::NotFound(name.clone()))?;
            routes.insert(
                channel_id.clone(),
                ChannelRoute {
                    channel_id: channel_id.clone(),
                    channel_name: name.clone(),
                    trigger_emoji: emoji.clone(),
                },
            );
        }
        Ok(Self { routes })
    }

    /// The route for `channel_id` when `reaction` is its trigger emoji.
    pub fn route_for(&self, channel_id: &str, reaction: &str) -> Option<&ChannelRoute> {
        self.routes
            .get(channel_id)
            .filter(|route| route.trigger_emoji == reaction)
    }

    pub fn matches(&self, channel_id: &str, reaction: &str) -> bool {
        self.route_for(channel_id, reaction).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes ordered by channel name.
    pub fn routes(&self) -> Vec<&ChannelRoute> {
        let mut routes: Vec<_> = self.routes.values().collect();
        routes.sort_by(|a, b| a.channel_name.cmp(&b.channel_name));
        routes
    }
}

/// Resolve the configured channels and build the routing table.
pub async fn build_routing_table(
    directory: &dyn ChannelDirectory,
    emojis_by_name: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<RoutingTable, ResolveError> {
    let names: BTreeSet<String> = emojis_by_name.keys().cloned().collect();
    let ids_by_name = resolve_channel_ids(directory, &names, cancel).await?;
    RoutingTable::from_resolved(&ids_by_name, emojis_by_name)
}
