//! Outbound side of the pipeline: where accepted answers go

use crate::types::AnswerEvent;
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Broadcast failed: {0}")]
    Failed(String),
}

/// Receives every answer event the pipeline emits.
///
/// Called synchronously from the event loop, one event at a time and in
/// source order. Implementations must not block.
pub trait AnswerBroadcaster: Send + Sync {
    fn broadcast(&self, event: AnswerEvent) -> Result<(), BroadcastError>;
}

impl<F> AnswerBroadcaster for F
where
    F: Fn(AnswerEvent) -> Result<(), BroadcastError> + Send + Sync,
{
    fn broadcast(&self, event: AnswerEvent) -> Result<(), BroadcastError> {
        self(event)
    }
}

/// Fans answer events out to overlay clients over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<AnswerEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnswerEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl AnswerBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: AnswerEvent) -> Result<(), BroadcastError> {
        // No overlay connected is fine, the answer is simply not shown
        if self.tx.send(event).is_err() {
            tracing::debug!("No overlay subscribers for answer event");
        }
        Ok(())
    }
}
