//! Structural checks at the pipeline boundaries
//!
//! `validate_inbound_message` guards the legacy comment shape on the way in,
//! `validate_outbound_payload` guards the answer payload on the way out.
//! Both collect every violation instead of stopping at the first one.

use crate::types::{AnswerPayload, LegacyComment, LegacyUser};
use serde_json::Value;
use std::fmt;

/// A single violated field rule
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of a validation: `data` on success, `errors` otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct Validation<T> {
    pub success: bool,
    pub data: Option<T>,
    pub errors: Vec<FieldError>,
}

impl<T> Validation<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    fn failed(errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }

    pub fn into_result(self) -> Result<T, Vec<FieldError>> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(self.errors),
        }
    }
}

/// Field errors joined into one line for logging
pub fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn non_empty_str<'a>(
    value: Option<&'a Value>,
    path: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        Some(Value::String(_)) => {
            errors.push(FieldError {
                path,
                message: "must not be empty",
            });
            None
        }
        _ => {
            errors.push(FieldError {
                path,
                message: "must be a string",
            });
            None
        }
    }
}

/// Enforce the legacy comment shape:
/// `{ user: { uniqueId, userId, nickname }, comment, timestamp > 0 }`
pub fn validate_inbound_message(raw: &Value) -> Validation<LegacyComment> {
    let mut errors = Vec::new();

    let user = raw.get("user");
    if !matches!(user, Some(Value::Object(_))) {
        errors.push(FieldError {
            path: "user",
            message: "must be an object",
        });
    }
    let user = user.filter(|u| u.is_object());

    let unique_id = user.and_then(|u| {
        non_empty_str(u.get("uniqueId"), "user.uniqueId", &mut errors).map(str::to_string)
    });
    let user_id = user.and_then(|u| {
        non_empty_str(u.get("userId"), "user.userId", &mut errors).map(str::to_string)
    });
    let nickname = user.and_then(|u| {
        non_empty_str(u.get("nickname"), "user.nickname", &mut errors).map(str::to_string)
    });
    let comment = non_empty_str(raw.get("comment"), "comment", &mut errors).map(str::to_string);

    let timestamp = match raw.get("timestamp").and_then(Value::as_f64) {
        Some(ts) if ts > 0.0 => Some(ts),
        Some(_) => {
            errors.push(FieldError {
                path: "timestamp",
                message: "must be positive",
            });
            None
        }
        None => {
            errors.push(FieldError {
                path: "timestamp",
                message: "must be a number",
            });
            None
        }
    };

    match (unique_id, user_id, nickname, comment, timestamp) {
        (Some(unique_id), Some(user_id), Some(nickname), Some(comment), Some(timestamp))
            if errors.is_empty() =>
        {
            Validation::ok(LegacyComment {
                user: LegacyUser {
                    unique_id,
                    user_id,
                    nickname,
                },
                comment,
                timestamp,
            })
        }
        _ => Validation::failed(errors),
    }
}

/// Enforce the answer payload shape before it leaves the pipeline
pub fn validate_outbound_payload(payload: &AnswerPayload) -> Validation<AnswerPayload> {
    let mut errors = Vec::new();

    if payload.username.is_empty() {
        errors.push(FieldError {
            path: "payload.username",
            message: "must not be empty",
        });
    }
    if payload.cleaned_text.is_empty() {
        errors.push(FieldError {
            path: "payload.cleanedText",
            message: "must not be empty",
        });
    }
    if payload.question_id.is_empty() {
        errors.push(FieldError {
            path: "payload.questionId",
            message: "must not be empty",
        });
    }
    if payload.timestamp <= 0 {
        errors.push(FieldError {
            path: "payload.timestamp",
            message: "must be positive",
        });
    }

    if errors.is_empty() {
        Validation::ok(payload.clone())
    } else {
        Validation::failed(errors)
    }
}
