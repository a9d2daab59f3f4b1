//! WebSocket message dispatch
//!
//! Host connections control the active question, feed connections push chat
//! events, overlay connections only listen.

use crate::protocol::{HostMessage, Role, ServerMessage, SourceEvent};
use crate::state::AppState;
use std::sync::Arc;

/// Macro to check the connection role and return early with an error otherwise
macro_rules! check_role {
    ($role:expr, $expected:expr, $action:expr) => {
        if *$role != $expected {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only {:?} connections can {}", $expected, $action),
            });
        }
    };
}

/// Handle a text frame from any connection and return an optional response
pub async fn handle_text(text: &str, role: &Role, state: &Arc<AppState>) -> Option<ServerMessage> {
    match role {
        Role::Host => match serde_json::from_str::<HostMessage>(text) {
            Ok(msg) => handle_host_message(msg, role, state).await,
            Err(e) => Some(parse_error(e)),
        },
        Role::Feed => match serde_json::from_str::<SourceEvent>(text) {
            Ok(event) => handle_feed_event(event, role, state),
            Err(e) => Some(parse_error(e)),
        },
        Role::Overlay => Some(ServerMessage::Error {
            code: "READ_ONLY".to_string(),
            msg: "Overlay connections do not accept messages".to_string(),
        }),
    }
}

fn parse_error(e: serde_json::Error) -> ServerMessage {
    tracing::warn!("Failed to parse client message: {}", e);
    ServerMessage::Error {
        code: "PARSE_ERROR".to_string(),
        msg: format!("Invalid message format: {}", e),
    }
}

pub async fn handle_host_message(
    msg: HostMessage,
    role: &Role,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    check_role!(role, Role::Host, "control questions");

    match msg {
        HostMessage::SetQuestion { question_id } => {
            tracing::info!("Host activating question {}", question_id);
            state.set_question(Some(question_id)).await;
        }
        HostMessage::ClearQuestion => {
            tracing::info!("Host clearing active question");
            state.set_question(None).await;
        }
        HostMessage::GetQuestion => {}
    }

    Some(ServerMessage::QuestionState {
        question_id: state.current_question().await,
    })
}

/// Publish a chat event into the feed. Feed connections get no reply on success.
pub fn handle_feed_event(
    event: SourceEvent,
    role: &Role,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    check_role!(role, Role::Feed, "publish chat events");

    tracing::trace!(kind = event.kind(), "Feed event received");
    state.feed.publish(event);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::telemetry::TracingTelemetry;
    use serde_json::json;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            &ServerConfig::default(),
            Arc::new(TracingTelemetry),
        ))
    }

    #[tokio::test]
    async fn test_host_sets_and_clears_question() {
        let state = state();

        let reply = handle_text(r#"{"t":"set_question","question_id":"Q1"}"#, &Role::Host, &state).await;
        assert!(matches!(
            reply,
            Some(ServerMessage::QuestionState { question_id: Some(ref id) }) if id == "Q1"
        ));
        assert_eq!(state.current_question().await.as_deref(), Some("Q1"));

        let reply = handle_text(r#"{"t":"clear_question"}"#, &Role::Host, &state).await;
        assert!(matches!(
            reply,
            Some(ServerMessage::QuestionState { question_id: None })
        ));
    }

    #[tokio::test]
    async fn test_only_host_controls_questions() {
        let state = state();
        let reply = handle_host_message(
            HostMessage::SetQuestion {
                question_id: "Q1".to_string(),
            },
            &Role::Feed,
            &state,
        )
        .await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "UNAUTHORIZED"));
        assert_eq!(state.current_question().await, None);
    }

    #[tokio::test]
    async fn test_feed_event_is_published() {
        let state = state();
        let mut rx = crate::feed::EventSource::subscribe(&state.feed);

        let frame = json!({
            "type": "comment",
            "data": {"username": "bob", "text": "Paris"}
        })
        .to_string();
        assert!(handle_text(&frame, &Role::Feed, &state).await.is_none());
        assert_eq!(rx.recv().await.unwrap().kind(), "comment");
    }

    #[tokio::test]
    async fn test_bad_frames_and_overlay_writes() {
        let state = state();

        let reply = handle_text("{not json", &Role::Feed, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "PARSE_ERROR"));

        let reply = handle_text(r#"{"t":"get_question"}"#, &Role::Overlay, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "READ_ONLY"));
    }
}
