use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type QuestionId = String;
pub type SessionId = String;

/// Epoch milliseconds
pub type TimestampMs = i64;

// ========== Inbound ==========

/// Author block of a legacy live-chat comment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUser {
    pub unique_id: String,
    pub user_id: String,
    pub nickname: String,
}

/// Comment as emitted by the legacy live-chat connector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacyComment {
    pub user: LegacyUser,
    pub comment: String,
    /// Epoch milliseconds, always positive once validated
    pub timestamp: f64,
}

/// Comment in the standardized chat-event format
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedComment {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub username: String,
    pub text: String,
    pub timestamp: TimestampMs,
    pub session_id: Option<SessionId>,
}

/// A comment after cleaning, before gating. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedComment {
    /// Trimmed, never blank
    pub username: String,
    /// Text exactly as the viewer sent it
    pub original_text: String,
    /// Output of `text::clean_text`, never empty
    pub cleaned_text: String,
    pub timestamp: TimestampMs,
    /// Session the comment arrived on, when the source format carries one
    pub session_id: Option<SessionId>,
}

// ========== Outbound ==========

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum AnswerEventType {
    #[serde(rename = "answer:received")]
    AnswerReceived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub username: String,
    pub cleaned_text: String,
    pub question_id: QuestionId,
    pub timestamp: TimestampMs,
}

/// Event handed to the broadcaster for every accepted answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    #[serde(rename = "type")]
    pub kind: AnswerEventType,
    pub payload: AnswerPayload,
    /// ISO-8601 time the event was built
    pub timestamp: String,
    pub session_id: SessionId,
}

impl AnswerEvent {
    pub fn new(payload: AnswerPayload, session_id: SessionId) -> Self {
        Self {
            kind: AnswerEventType::AnswerReceived,
            payload,
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id,
        }
    }
}

/// Generate a correlation id (ULID string)
pub fn generate_id() -> String {
    ulid::Ulid::new().to_string()
}
