use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::crypto::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::escalation::Decision;
use crate::events::{parse_envelope, Envelope};
use crate::AppState;

const RETRY_NUM_HEADER: &str = "X-Slack-Retry-Num";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handle Slack Events API callbacks.
///
/// The signature is verified before anything in the body is trusted,
/// including the `url_verification` challenge. Matching `reaction_added`
/// events are escalated on a background task so Slack gets its
/// acknowledgement within its 3 second window; every parsed request is
/// answered with 200 and the original body.
pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = crypto::verify(
        &body,
        header_str(&headers, TIMESTAMP_HEADER),
        header_str(&headers, SIGNATURE_HEADER),
        &state.signing,
    ) {
        tracing::warn!(error = %e, "Rejected Slack request");
        return e.status().into_response();
    }

    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!("Failed to parse Slack event: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            tracing::info!("Answered Slack URL verification");
            return ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response();
        }
        Envelope::EventCallback { event_id, event } => {
            if let Some(retry) = header_str(&headers, RETRY_NUM_HEADER) {
                tracing::debug!(event_id = ?event_id, retry, "Slack redelivery");
            }

            match state.escalator.decide(event_id.as_deref(), &event) {
                Decision::Escalate(escalation) => {
                    tracing::info!(
                        channel = %escalation.thread.channel_id,
                        ts = %escalation.thread.root_ts,
                        event_id = ?escalation.event_id,
                        "Escalating thread"
                    );
                    let task_state = state.clone();
                    state.tasks.spawn(async move {
                        let cancel = task_state.cancel.child_token();
                        task_state.escalator.dispatch(escalation, cancel).await;
                    });
                }
                Decision::Ignore(reason) => {
                    tracing::debug!(event_id = ?event_id, reason, "Ignoring Slack event");
                }
            }
        }
        Envelope::Unknown => {
            tracing::debug!("Ignoring unknown Slack envelope type");
        }
    }

    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
