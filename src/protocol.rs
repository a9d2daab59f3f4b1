use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event coming from the chat feed. Only `Comment` carries an answer candidate;
/// the lifecycle variants are passed through the feed but ignored by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SourceEvent {
    /// Raw comment in either the legacy or the standardized shape
    Comment(Value),
    Connected,
    Disconnected,
    Error { message: String },
}

impl SourceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceEvent::Comment(_) => "comment",
            SourceEvent::Connected => "connected",
            SourceEvent::Disconnected => "disconnected",
            SourceEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Quiz orchestrator, controls the active question
    Host,
    /// Chat connector pushing `SourceEvent` frames
    Feed,
    /// OBS overlay receiving answer events
    Overlay,
}

/// Messages a host connection may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum HostMessage {
    SetQuestion { question_id: QuestionId },
    ClearQuestion,
    GetQuestion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        current_question_id: Option<QuestionId>,
        server_now: String,
    },
    QuestionState {
        question_id: Option<QuestionId>,
    },
    Answer(AnswerEvent),
    Error {
        code: String,
        msg: String,
    },
}
