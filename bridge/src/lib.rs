// Library entry point for the binary and tests
pub mod api;
pub mod config;
pub mod crypto;
pub mod dedup;
pub mod error;
pub mod escalation;
pub mod events;
pub mod jira;
pub mod slack;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::crypto::SigningContext;
use crate::escalation::Escalator;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub signing: SigningContext,
    pub escalator: Escalator,
    /// Background escalations spawned by the webhook handler.
    pub tasks: TaskTracker,
    /// Cancels in-flight escalations (used when shutdown runs out of grace).
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(signing: SigningContext, escalator: Escalator) -> Self {
        Self {
            signing,
            escalator,
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }
}
