use crate::bridge::EventBridge;
use crate::broadcast::ChannelBroadcaster;
use crate::config::ServerConfig;
use crate::feed::ChatFeed;
use crate::question::QuestionReader;
use crate::telemetry::Telemetry;
use crate::types::QuestionId;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
pub struct AppState {
    /// Chat events pushed by feed connections
    pub feed: ChatFeed,
    /// Answer events fanned out to overlay connections
    pub overlay: ChannelBroadcaster,
    pub bridge: RwLock<EventBridge>,
}

impl AppState {
    /// Build the pipeline and subscribe the bridge to the feed.
    /// Must run inside the tokio runtime.
    pub fn new(config: &ServerConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        let feed = ChatFeed::new(config.feed_capacity);
        let overlay = ChannelBroadcaster::new(config.overlay_capacity);

        let mut bridge = EventBridge::new(telemetry);
        bridge.initialize(&feed, Arc::new(overlay.clone()));

        Self {
            feed,
            overlay,
            bridge: RwLock::new(bridge),
        }
    }

    pub async fn set_question(&self, id: Option<QuestionId>) -> Option<QuestionId> {
        self.bridge.read().await.set_current_question(id)
    }

    pub async fn current_question(&self) -> Option<QuestionId> {
        self.bridge.read().await.current_question_id()
    }

    pub async fn question_reader(&self) -> QuestionReader {
        self.bridge.read().await.question_reader()
    }

    pub async fn is_attached(&self) -> bool {
        self.bridge.read().await.is_attached()
    }

    /// Detach the bridge from the feed
    pub async fn shutdown(&self) {
        self.bridge.write().await.cleanup();
    }
}
