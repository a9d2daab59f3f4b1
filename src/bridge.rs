//! Event bridge: chat feed in, answer events out
//!
//! Owns the subscription to the chat feed and runs every comment through
//! parse → gate → outbound validation → broadcaster. Each event is processed
//! to completion before the next one is received, so broadcasts keep the
//! feed's order. Nothing in here returns an error to the feed: every failure
//! ends up in telemetry and the next event is processed normally.

use crate::broadcast::AnswerBroadcaster;
use crate::feed::EventSource;
use crate::gate::{AnswerBroadcastGate, GateDecision};
use crate::parser::{panic_message, CommentParser};
use crate::protocol::SourceEvent;
use crate::question::{QuestionContext, QuestionReader, QuestionWriter};
use crate::schema::{summarize, validate_outbound_payload};
use crate::telemetry::{self, MetricUnit, Severity, Telemetry};
use crate::types::{generate_id, AnswerEvent, QuestionId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// What happened to a single source event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a comment event
    Ignored,
    /// Not a usable comment (bad shape, blank user, nothing left after cleaning)
    Unparsed,
    /// Valid comment but no question was active
    NoActiveQuestion,
    /// Outbound payload failed validation and was not emitted
    Rejected,
    Broadcast,
    /// Broadcaster returned an error or something panicked
    Failed,
    /// The bridge was cleaned up
    Detached,
}

/// Per-event processing, shared between the consumer task and direct dispatch
struct Pipeline {
    parser: CommentParser,
    gate: AnswerBroadcastGate,
    broadcaster: Arc<dyn AnswerBroadcaster>,
    telemetry: Arc<dyn Telemetry>,
}

impl Pipeline {
    fn handle(&self, event: &SourceEvent) -> DispatchOutcome {
        let raw = match event {
            SourceEvent::Comment(raw) => raw,
            other => {
                tracing::trace!(kind = other.kind(), "Ignoring non-comment feed event");
                return DispatchOutcome::Ignored;
            }
        };

        let Some(comment) = self.parser.parse(raw) else {
            return DispatchOutcome::Unparsed;
        };

        let active = match self.gate.admit(&comment) {
            GateDecision::Open(active) => active,
            GateDecision::Closed => return DispatchOutcome::NoActiveQuestion,
        };

        let validation = validate_outbound_payload(&active.payload_for(&comment));
        let payload = match validation.into_result() {
            Ok(payload) => payload,
            Err(errors) => {
                let summary = summarize(&errors);
                let context = telemetry::tags([
                    ("stage", "outbound_validation"),
                    ("question_id", active.id()),
                    ("username", comment.username.as_str()),
                    ("errors", summary.as_str()),
                ]);
                telemetry::error(
                    self.telemetry.as_ref(),
                    "Answer payload failed validation despite an active question",
                    Severity::High,
                    &context,
                );
                return DispatchOutcome::Rejected;
            }
        };

        let session_id = comment.session_id.clone().unwrap_or_else(generate_id);
        let answer = AnswerEvent::new(payload, session_id);

        match self.broadcaster.broadcast(answer) {
            Ok(()) => {
                tracing::debug!(
                    username = %comment.username,
                    question_id = active.id(),
                    "Answer broadcast"
                );
                telemetry::metric(
                    self.telemetry.as_ref(),
                    telemetry::METRIC_ANSWER_BROADCAST,
                    1.0,
                    MetricUnit::Count,
                    &telemetry::tags([("question_id", active.id())]),
                );
                DispatchOutcome::Broadcast
            }
            Err(e) => {
                let context = telemetry::tags([("stage", "broadcast"), ("question_id", active.id())]);
                telemetry::error(
                    self.telemetry.as_ref(),
                    &format!("Answer broadcast failed: {}", e),
                    Severity::High,
                    &context,
                );
                DispatchOutcome::Failed
            }
        }
    }

    /// `handle` inside a panic boundary
    fn dispatch(&self, event: &SourceEvent) -> DispatchOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle(event))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let context = telemetry::tags([("stage", "dispatch"), ("kind", event.kind())]);
                telemetry::error(
                    self.telemetry.as_ref(),
                    &format!("Panic while processing feed event: {}", panic_message(payload.as_ref())),
                    Severity::High,
                    &context,
                );
                DispatchOutcome::Failed
            }
        }
    }
}

type PipelineSlot = Arc<RwLock<Option<Pipeline>>>;

fn dispatch_in(slot: &PipelineSlot, event: &SourceEvent) -> DispatchOutcome {
    // Held for the whole event so cleanup waits for an in-flight event and
    // nothing runs after it returns.
    let guard = slot.read().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(pipeline) => pipeline.dispatch(event),
        None => DispatchOutcome::Detached,
    }
}

/// Connects a chat feed to an answer broadcaster, gated on the active question
pub struct EventBridge {
    question: QuestionWriter,
    telemetry: Arc<dyn Telemetry>,
    slot: PipelineSlot,
    consumer: Option<JoinHandle<()>>,
}

impl EventBridge {
    /// Create a detached bridge with an empty question context
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        let (question, _reader) = QuestionContext::create();
        Self {
            question,
            telemetry,
            slot: Arc::new(RwLock::new(None)),
            consumer: None,
        }
    }

    /// Subscribe to `source` and start forwarding answers to `broadcaster`.
    ///
    /// Replaces any previous subscription. Must be called inside a tokio
    /// runtime for the subscription to be consumed; without one the bridge
    /// still accepts events through [`dispatch`](Self::dispatch).
    pub fn initialize(&mut self, source: &dyn EventSource, broadcaster: Arc<dyn AnswerBroadcaster>) {
        self.detach();

        let pipeline = Pipeline {
            parser: CommentParser::new(self.telemetry.clone()),
            gate: AnswerBroadcastGate::new(self.question.reader(), self.telemetry.clone()),
            broadcaster,
            telemetry: self.telemetry.clone(),
        };
        // Fresh slot per subscription: a consumer that outlives its abort only
        // ever sees its own, now empty, slot.
        self.slot = Arc::new(RwLock::new(Some(pipeline)));

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                telemetry::error(
                    self.telemetry.as_ref(),
                    &format!("Cannot subscribe to chat feed outside a tokio runtime: {}", e),
                    Severity::High,
                    &telemetry::tags([("stage", "initialize")]),
                );
                return;
            }
        };

        let mut rx = source.subscribe();
        let slot = self.slot.clone();
        let sink = self.telemetry.clone();

        self.consumer = Some(runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if dispatch_in(&slot, &event) == DispatchOutcome::Detached {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event bridge lagging behind chat feed");
                        telemetry::metric(
                            sink.as_ref(),
                            telemetry::METRIC_FEED_LAGGED,
                            skipped as f64,
                            MetricUnit::Count,
                            &telemetry::Tags::new(),
                        );
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Chat feed closed, event bridge stops listening");
                        break;
                    }
                }
            }
        }));

        tracing::info!("Event bridge initialized");
    }

    /// Run one event through the pipeline right now
    pub fn dispatch(&self, event: &SourceEvent) -> DispatchOutcome {
        dispatch_in(&self.slot, event)
    }

    /// Detach from the feed, drop the broadcaster and clear the question. Idempotent.
    pub fn cleanup(&mut self) {
        let was_attached = self.detach();
        self.question.set_current_question(None);
        if was_attached {
            tracing::info!("Event bridge cleaned up");
        }
    }

    fn detach(&mut self) -> bool {
        let pipeline = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
        pipeline.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_current_question(&self, id: Option<QuestionId>) -> Option<QuestionId> {
        self.question.set_current_question(id)
    }

    pub fn current_question_id(&self) -> Option<QuestionId> {
        self.question.current_question_id()
    }

    /// Read-only view of the question cell, e.g. to push question changes to clients
    pub fn question_reader(&self) -> QuestionReader {
        self.question.reader()
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.detach();
    }
}
