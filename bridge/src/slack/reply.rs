use super::MessagePoster;
use crate::error::PostError;

/// Reply into the thread rooted at `root_ts`.
pub async fn post_to_thread(
    poster: &dyn MessagePoster,
    channel_id: &str,
    root_ts: &str,
    body: &str,
) -> Result<(), PostError> {
    match poster.post_message(channel_id, root_ts, body).await {
        Ok(outcome) if outcome.ok => {
            tracing::debug!(
                channel = %channel_id,
                thread_ts = %root_ts,
                ts = ?outcome.ts,
                "Posted thread reply"
            );
            Ok(())
        }
        Ok(outcome) => Err(PostError::DeliveryFailed(
            outcome
                .diagnostics
                .unwrap_or_else(|| "unknown error".to_string()),
        )),
        Err(e) => Err(PostError::DeliveryFailed(e.to_string())),
    }
}
