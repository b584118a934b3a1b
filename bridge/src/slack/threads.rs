use tokio_util::sync::CancellationToken;

use super::{non_empty_cursor, Message, ThreadReference, ThreadReplies};
use crate::error::FetchError;

/// Fetch every message in a thread, root first, in the order Slack returns
/// them. Pages are requested one at a time since each cursor comes from the
/// previous response.
pub async fn fetch_thread(
    replies: &dyn ThreadReplies,
    thread: &ThreadReference,
    cancel: &CancellationToken,
) -> Result<Vec<Message>, FetchError> {
    let mut messages: Vec<Message> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { partial: messages });
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            page = replies.list_thread_replies(thread, cursor.take()) => Some(page),
        };
        let page = match result {
            Some(Ok(page)) => page,
            Some(Err(source)) => {
                return Err(FetchError::TransportFailure {
                    partial: messages,
                    source,
                })
            }
            None => return Err(FetchError::Cancelled { partial: messages }),
        };

        messages.extend(page.messages);

        if !page.has_more {
            break;
        }
        match non_empty_cursor(page.next_cursor) {
            Some(next) => cursor = Some(next),
            None => {
                tracing::warn!(
                    channel = %thread.channel_id,
                    ts = %thread.root_ts,
                    "Slack reported more replies without a cursor; stopping"
                );
                break;
            }
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlackApiError;
    use crate::slack::{MockThreadReplies, RepliesPage};

    fn msg(ts: &str) -> Message {
        Message {
            ts: ts.to_string(),
            user: "U1".to_string(),
            text: format!("message {}", ts),
        }
    }

    fn thread() -> ThreadReference {
        ThreadReference::new("C1", "1000.1")
    }

    #[tokio::test]
    async fn follows_cursors_preserving_order() {
        let mut replies = MockThreadReplies::new();
        replies
            .expect_list_thread_replies()
            .times(2)
            .returning(|thread, cursor| {
                assert_eq!(thread.channel_id, "C1");
                assert_eq!(thread.root_ts, "1000.1");
                match cursor.as_deref() {
                    None => Ok(RepliesPage {
                        messages: vec![msg("2")],
                        has_more: true,
                        next_cursor: Some("next".to_string()),
                    }),
                    Some("next") => Ok(RepliesPage {
                        messages: vec![msg("5")],
                        has_more: false,
                        next_cursor: Some(String::new()),
                    }),
                    other => panic!("unexpected cursor {:?}", other),
                }
            });

        let messages = fetch_thread(&replies, &thread(), &CancellationToken::new())
            .await
            .unwrap();

        let ts: Vec<_> = messages.iter().map(|m| m.ts.as_str()).collect();
        assert_eq!(ts, vec!["2", "5"]);
    }

    #[tokio::test]
    async fn order_is_not_resorted() {
        let mut replies = MockThreadReplies::new();
        replies
            .expect_list_thread_replies()
            .times(2)
            .returning(|_, cursor| match cursor {
                None => Ok(RepliesPage {
                    messages: vec![msg("9")],
                    has_more: true,
                    next_cursor: Some("n".to_string()),
                }),
                Some(_) => Ok(RepliesPage {
                    messages: vec![msg("3"), msg("4")],
                    has_more: false,
                    next_cursor: None,
                }),
            });

        let messages = fetch_thread(&replies, &thread(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(messages, vec![msg("9"), msg("3"), msg("4")]);
    }

    #[tokio::test]
    async fn root_only_thread_yields_one_message() {
        let mut replies = MockThreadReplies::new();
        replies
            .expect_list_thread_replies()
            .times(1)
            .returning(|_, _| {
                Ok(RepliesPage {
                    messages: vec![msg("1000.1")],
                    has_more: false,
                    next_cursor: None,
                })
            });

        let messages = fetch_thread(&replies, &thread(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(messages, vec![msg("1000.1")]);
    }

    #[tokio::test]
    async fn page_error_keeps_partial_messages() {
        let mut replies = MockThreadReplies::new();
        replies
            .expect_list_thread_replies()
            .times(2)
            .returning(|_, cursor| match cursor {
                None => Ok(RepliesPage {
                    messages: vec![msg("1"), msg("2")],
                    has_more: true,
                    next_cursor: Some("n".to_string()),
                }),
                Some(_) => Err(SlackApiError::Api {
                    method: "conversations.replies".to_string(),
                    error: "thread_not_found".to_string(),
                }),
            });

        let err = fetch_thread(&replies, &thread(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TransportFailure { .. }));
        assert_eq!(err.partial(), &[msg("1"), msg("2")]);
    }

    #[tokio::test]
    async fn has_more_without_cursor_stops() {
        let mut replies = MockThreadReplies::new();
        replies
            .expect_list_thread_replies()
            .times(1)
            .returning(|_, _| {
                Ok(RepliesPage {
                    messages: vec![msg("1")],
                    has_more: true,
                    next_cursor: None,
                })
            });

        let messages = fetch_thread(&replies, &thread(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_fetch_returns_empty_partial() {
        let mut replies = MockThreadReplies::new();
        replies.expect_list_thread_replies().never();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_thread(&replies, &thread(), &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled { ref partial } if partial.is_empty()));
    }
}
