//! Chat comment parsing
//!
//! Raw chat events arrive in one of two shapes (legacy live-chat connector or
//! the standardized chat-event format). [`InboundComment::classify`] is the
//! single place that tells them apart; [`CommentParser`] then cleans the text
//! and produces a [`ParsedComment`] or nothing at all.

use crate::schema::{summarize, validate_inbound_message};
use crate::telemetry::{self, Severity, Telemetry};
use crate::text::clean_text;
use crate::types::{LegacyComment, ParsedComment, StandardizedComment, TimestampMs};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Max characters of the raw input kept when reporting a parse failure
pub const SNAPSHOT_MAX_CHARS: usize = 200;

/// The two accepted inbound shapes
#[derive(Debug, Clone, PartialEq)]
pub enum InboundComment {
    Standardized(StandardizedComment),
    Legacy(LegacyComment),
}

/// Why a raw event was not accepted as a comment
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRejection {
    NotAnObject,
    UnrecognizedShape,
    InvalidLegacy(String),
    NotAString(&'static str),
}

/// JS-style truthiness: present, not null/false/0/""
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Loose string field: strings as-is, numbers stringified, anything else dropped
fn opt_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Date string or epoch-ms number. Anything else, an unparseable date, or a
/// value at or before the epoch falls back to now.
fn standardized_timestamp(value: Option<&Value>) -> TimestampMs {
    let parsed = match value {
        Some(Value::String(s)) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(dt.timestamp_millis()),
            Err(_) => {
                tracing::debug!(timestamp = %s, "Unparseable comment date, using current time");
                None
            }
        },
        Some(Value::Number(n)) => n.as_f64().map(|f| f.ceil() as TimestampMs),
        _ => None,
    };
    parsed.filter(|ms| *ms > 0).unwrap_or_else(now_ms)
}

impl InboundComment {
    /// Decide which shape `raw` is. Standardized wins when both would match.
    pub fn classify(raw: &Value) -> Result<Self, ShapeRejection> {
        let obj = raw.as_object().ok_or(ShapeRejection::NotAnObject)?;

        if is_present(obj.get("username")) && is_present(obj.get("text")) {
            return Self::standardized(raw).map(InboundComment::Standardized);
        }

        let has_unique_id = is_present(raw.get("user").and_then(|u| u.get("uniqueId")));
        if has_unique_id && is_present(obj.get("comment")) {
            return validate_inbound_message(raw)
                .into_result()
                .map(InboundComment::Legacy)
                .map_err(|errors| ShapeRejection::InvalidLegacy(summarize(&errors)));
        }

        Err(ShapeRejection::UnrecognizedShape)
    }

    fn standardized(raw: &Value) -> Result<StandardizedComment, ShapeRejection> {
        let username = raw
            .get("username")
            .and_then(Value::as_str)
            .ok_or(ShapeRejection::NotAString("username"))?;
        let text = raw
            .get("text")
            .and_then(Value::as_str)
            .ok_or(ShapeRejection::NotAString("text"))?;

        Ok(StandardizedComment {
            id: opt_string(raw.get("id")),
            user_id: opt_string(raw.get("userId")),
            username: username.to_string(),
            text: text.to_string(),
            timestamp: standardized_timestamp(raw.get("timestamp")),
            session_id: opt_string(raw.get("sessionId")),
        })
    }

    pub fn username(&self) -> &str {
        match self {
            InboundComment::Standardized(c) => &c.username,
            InboundComment::Legacy(c) => &c.user.unique_id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            InboundComment::Standardized(c) => &c.text,
            InboundComment::Legacy(c) => &c.comment,
        }
    }

    pub fn timestamp(&self) -> TimestampMs {
        match self {
            InboundComment::Standardized(c) => c.timestamp,
            // validated > 0, so rounding up keeps it positive
            InboundComment::Legacy(c) => c.timestamp.ceil() as TimestampMs,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            InboundComment::Standardized(c) => c.session_id.as_deref(),
            InboundComment::Legacy(_) => None,
        }
    }
}

/// Shape check, username/text check, text cleaning
fn parse_inner(raw: &Value) -> Option<ParsedComment> {
    let inbound = match InboundComment::classify(raw) {
        Ok(inbound) => inbound,
        Err(reason) => {
            tracing::debug!(?reason, "Dropping event that is not a comment");
            return None;
        }
    };

    let username = inbound.username().trim();
    if username.is_empty() {
        tracing::debug!("Dropping comment with blank username");
        return None;
    }

    let cleaned_text = clean_text(inbound.text());
    if cleaned_text.is_empty() {
        tracing::debug!(username, "Dropping comment with no text left after cleaning");
        return None;
    }

    Some(ParsedComment {
        username: username.to_string(),
        original_text: inbound.text().to_string(),
        cleaned_text,
        timestamp: inbound.timestamp(),
        session_id: inbound.session_id().map(str::to_string),
    })
}

/// First `SNAPSHOT_MAX_CHARS` characters of the serialized input
pub fn input_snapshot(raw: &Value) -> String {
    raw.to_string().chars().take(SNAPSHOT_MAX_CHARS).collect()
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Turns raw chat events into [`ParsedComment`]s. Never panics to the caller.
#[derive(Clone)]
pub struct CommentParser {
    telemetry: Arc<dyn Telemetry>,
}

impl CommentParser {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self { telemetry }
    }

    /// Parse one raw event. `None` means "not an answer candidate".
    pub fn parse(&self, raw: &Value) -> Option<ParsedComment> {
        match panic::catch_unwind(AssertUnwindSafe(|| parse_inner(raw))) {
            Ok(parsed) => parsed,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let snapshot = input_snapshot(raw);
                let context = telemetry::tags([("stage", "parse"), ("input", snapshot.as_str())]);
                telemetry::error(
                    self.telemetry.as_ref(),
                    &format!("Comment parsing failed: {}", message),
                    Severity::Medium,
                    &context,
                );
                None
            }
        }
    }
}
