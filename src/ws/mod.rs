pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{Role, ServerMessage};
use crate::state::AppState;
use crate::types::AnswerEvent;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: role={:?}", params.role);

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

fn parse_role(role: Option<&str>) -> Role {
    match role {
        Some("host") => Role::Host,
        Some("feed") => Role::Feed,
        _ => Role::Overlay,
    }
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let role = parse_role(params.role.as_deref());

    tracing::info!("WebSocket connected with role: {:?}", role);

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        role,
        current_question_id: state.current_question().await,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    // Overlays get answers; hosts and overlays get question changes
    let mut answer_rx = (role == Role::Overlay).then(|| state.overlay.subscribe());
    let mut question_rx = if role == Role::Feed {
        None
    } else {
        Some(state.question_reader().await)
    };

    loop {
        tokio::select! {
            answer = async {
                match &mut answer_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending::<Result<AnswerEvent, RecvError>>().await,
                }
            } => {
                match answer {
                    Ok(event) => {
                        if !send_json(&mut sender, &ServerMessage::Answer(event)).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Overlay connection lagging, answers dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            question = async {
                match &mut question_rx {
                    Some(rx) => rx.changed().await,
                    None => std::future::pending::<Option<Option<String>>>().await,
                }
            } => {
                match question {
                    Some(question_id) => {
                        if !send_json(&mut sender, &ServerMessage::QuestionState { question_id }).await {
                            break;
                        }
                    }
                    // Bridge dropped, server is going away
                    None => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);
                        if let Some(response) = handlers::handle_text(text.as_str(), &role, &state).await {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for role: {:?}", role);
}
