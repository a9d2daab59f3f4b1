//! The active-question cell
//!
//! Exactly one writer (the orchestrator, via [`QuestionWriter`]) and any
//! number of read-only handles ([`QuestionReader`]) used by the gate.
//! Reads are synchronous so the gate can check the cell at dispatch time.

use crate::types::QuestionId;
use tokio::sync::watch;

pub struct QuestionContext;

impl QuestionContext {
    /// Create an empty context, returning its single writer and a reader
    pub fn create() -> (QuestionWriter, QuestionReader) {
        let (tx, rx) = watch::channel(None);
        (QuestionWriter { tx }, QuestionReader { rx })
    }
}

/// Write side of the question cell. Not `Clone`: there is one writer.
#[derive(Debug)]
pub struct QuestionWriter {
    tx: watch::Sender<Option<QuestionId>>,
}

impl QuestionWriter {
    /// Set or clear the active question. Blank ids clear it.
    /// Returns the previously active question.
    pub fn set_current_question(&self, id: Option<QuestionId>) -> Option<QuestionId> {
        let id = id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let previous = self.tx.send_replace(id.clone());

        if previous != id {
            match &id {
                Some(id) => tracing::info!(question_id = %id, "Question activated"),
                None => tracing::info!("Question cleared"),
            }
        }
        previous
    }

    pub fn current_question_id(&self) -> Option<QuestionId> {
        self.tx.borrow().clone()
    }

    /// Hand out another read-only view of this cell
    pub fn reader(&self) -> QuestionReader {
        QuestionReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the question cell
#[derive(Debug, Clone)]
pub struct QuestionReader {
    rx: watch::Receiver<Option<QuestionId>>,
}

impl QuestionReader {
    pub fn current_question_id(&self) -> Option<QuestionId> {
        self.rx.borrow().clone()
    }

    /// Wait until the active question changes. Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<Option<QuestionId>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
