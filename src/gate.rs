use crate::question::QuestionReader;
use crate::telemetry::{self, MetricUnit, Telemetry};
use crate::types::{AnswerPayload, ParsedComment, QuestionId};
use std::sync::Arc;

/// Proof that a question was active when the gate was checked.
/// Only the gate can build one, so payloads never carry an empty question id.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveQuestion(QuestionId);

impl ActiveQuestion {
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Build the outbound payload for a comment answering this question
    pub fn payload_for(&self, comment: &ParsedComment) -> AnswerPayload {
        AnswerPayload {
            username: comment.username.clone(),
            cleaned_text: comment.cleaned_text.clone(),
            question_id: self.0.clone(),
            timestamp: comment.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Open(ActiveQuestion),
    Closed,
}

/// Lets a comment through only while a question is active.
///
/// The question cell is read when [`admit`](Self::admit) runs, i.e. at
/// dispatch time. Comments that arrive while no question is active are
/// dropped, not buffered.
#[derive(Clone)]
pub struct AnswerBroadcastGate {
    question: QuestionReader,
    telemetry: Arc<dyn Telemetry>,
}

impl AnswerBroadcastGate {
    pub fn new(question: QuestionReader, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            question,
            telemetry,
        }
    }

    pub fn admit(&self, comment: &ParsedComment) -> GateDecision {
        match self.question.current_question_id() {
            Some(id) if !id.is_empty() => GateDecision::Open(ActiveQuestion(id)),
            _ => {
                tracing::debug!(
                    username = %comment.username,
                    "No active question, dropping comment"
                );
                telemetry::metric(
                    self.telemetry.as_ref(),
                    telemetry::METRIC_DROPPED_NO_QUESTION,
                    1.0,
                    MetricUnit::Count,
                    &telemetry::Tags::new(),
                );
                GateDecision::Closed
            }
        }
    }
}
