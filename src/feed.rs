//! In-process chat feed
//!
//! The real chat transport lives outside this crate; connectors push what they
//! receive into a [`ChatFeed`], and the event bridge subscribes to it.

use crate::protocol::SourceEvent;
use serde_json::Value;
use tokio::sync::broadcast;

/// Anything the event bridge can subscribe to
pub trait EventSource {
    fn subscribe(&self) -> broadcast::Receiver<SourceEvent>;
}

#[derive(Debug, Clone)]
pub struct ChatFeed {
    tx: broadcast::Sender<SourceEvent>,
}

impl ChatFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers will see it.
    pub fn publish(&self, event: SourceEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!(kind, "Chat feed event published with no subscribers");
                0
            }
        }
    }

    pub fn publish_comment(&self, raw: Value) -> usize {
        self.publish(SourceEvent::Comment(raw))
    }
}

impl Default for ChatFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSource for ChatFeed {
    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.tx.subscribe()
    }
}
