use quizcast::bridge::{DispatchOutcome, EventBridge};
use quizcast::broadcast::{AnswerBroadcaster, BroadcastError};
use quizcast::feed::ChatFeed;
use quizcast::protocol::SourceEvent;
use quizcast::telemetry::{self, MetricUnit, Severity, Tags, Telemetry, TelemetryResult};
use quizcast::types::AnswerEvent;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingSink {
    metrics: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, Severity)>>,
}

impl Telemetry for RecordingSink {
    fn record_metric(&self, name: &str, _: f64, _: MetricUnit, _: &Tags) -> TelemetryResult {
        self.metrics.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn record_error(&self, error: &str, severity: Severity, _: &Tags) -> TelemetryResult {
        self.errors
            .lock()
            .unwrap()
            .push((error.to_string(), severity));
        Ok(())
    }
}

fn legacy(user: &str, comment: &str) -> Value {
    json!({
        "user": {"uniqueId": user, "userId": "12345", "nickname": user},
        "comment": comment,
        "timestamp": 1704067200000i64
    })
}

fn pipeline() -> (
    EventBridge,
    ChatFeed,
    mpsc::UnboundedReceiver<AnswerEvent>,
    Arc<RecordingSink>,
) {
    pipeline_with_capacity(64)
}

/// Bridge wired to a feed, with every broadcast forwarded to a channel
fn pipeline_with_capacity(capacity: usize) -> (
    EventBridge,
    ChatFeed,
    mpsc::UnboundedReceiver<AnswerEvent>,
    Arc<RecordingSink>,
) {
    let sink = Arc::new(RecordingSink::default());
    let feed = ChatFeed::new(capacity);
    let (tx, rx) = mpsc::unbounded_channel();
    let broadcaster = move |event: AnswerEvent| -> Result<(), BroadcastError> {
        tx.send(event)
            .map_err(|e| BroadcastError::Failed(e.to_string()))
    };

    let mut bridge = EventBridge::new(sink.clone());
    bridge.initialize(&feed, Arc::new(broadcaster));
    (bridge, feed, rx, sink)
}

async fn next_answer(rx: &mut mpsc::UnboundedReceiver<AnswerEvent>) -> AnswerEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("answer should be broadcast")
        .expect("broadcaster channel open")
}

fn metric_count(sink: &RecordingSink, name: &str) -> usize {
    sink.metrics
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.as_str() == name)
        .count()
}

/// Wait until the bridge has recorded `count` occurrences of `name`
async fn wait_for_metric(sink: &RecordingSink, name: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while metric_count(sink, name) < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("metric should be recorded");
}

#[tokio::test]
async fn test_comment_becomes_answer_event() {
    let (bridge, feed, mut rx, sink) = pipeline();
    bridge.set_current_question(Some("Q1".to_string()));

    feed.publish_comment(legacy("testuser123", "@streamer Réponse B 🎉😊"));

    let event = next_answer(&mut rx).await;
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "answer:received");
    assert_eq!(json["payload"]["username"], "testuser123");
    assert_eq!(json["payload"]["cleanedText"], "reponse b");
    assert_eq!(json["payload"]["questionId"], "Q1");
    assert_eq!(json["payload"]["timestamp"], 1704067200000i64);
    assert!(!event.session_id.is_empty());

    assert!(sink
        .metrics
        .lock()
        .unwrap()
        .contains(&telemetry::METRIC_ANSWER_BROADCAST.to_string()));
}

#[tokio::test]
async fn test_no_question_no_broadcast() {
    let (bridge, feed, mut rx, sink) = pipeline();

    for i in 0..10 {
        feed.publish_comment(legacy("viewer", &format!("answer {}", i)));
    }
    // a lifecycle event with no metric
    feed.publish(SourceEvent::Connected);
    wait_for_metric(&sink, telemetry::METRIC_DROPPED_NO_QUESTION, 10).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(sink.metrics.lock().unwrap().len(), 10);
    assert_eq!(bridge.current_question_id(), None);
}

#[tokio::test]
async fn test_broadcast_order_matches_feed_order() {
    let (bridge, feed, mut rx, _sink) = pipeline();
    bridge.set_current_question(Some("Q1".to_string()));

    for text in ["C1", "C2", "C3"] {
        feed.publish_comment(legacy("viewer", text));
    }

    let order: Vec<String> = vec![
        next_answer(&mut rx).await.payload.cleaned_text,
        next_answer(&mut rx).await.payload.cleaned_text,
        next_answer(&mut rx).await.payload.cleaned_text,
    ];
    assert_eq!(order, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn test_question_activated_mid_stream() {
    let (bridge, feed, mut rx, sink) = pipeline();

    feed.publish_comment(legacy("early", "too soon"));
    wait_for_metric(&sink, telemetry::METRIC_DROPPED_NO_QUESTION, 1).await;

    bridge.set_current_question(Some("Q2".to_string()));
    feed.publish_comment(legacy("ontime", "Paris"));

    let event = next_answer(&mut rx).await;
    assert_eq!(event.payload.username, "ontime");
    assert_eq!(event.payload.question_id, "Q2");

    bridge.set_current_question(None);
    feed.publish_comment(legacy("late", "Lyon"));
    wait_for_metric(&sink, telemetry::METRIC_DROPPED_NO_QUESTION, 2).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_bad_input_does_not_break_the_stream() {
    let (bridge, feed, mut rx, sink) = pipeline();
    bridge.set_current_question(Some("Q1".to_string()));

    feed.publish_comment(json!("just a string"));
    feed.publish_comment(json!({"user": {"uniqueId": "x"}, "comment": "no timestamp"}));
    feed.publish_comment(legacy("emoji", "🎉😊🔥"));
    feed.publish(SourceEvent::Error {
        message: "upstream hiccup".to_string(),
    });
    feed.publish_comment(legacy("good", "Réponse Ç"));

    let event = next_answer(&mut rx).await;
    assert_eq!(event.payload.username, "good");
    assert_eq!(event.payload.cleaned_text, "reponse c");
    assert!(sink.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_standardized_comments_keep_session() {
    let (bridge, feed, mut rx, _sink) = pipeline();
    bridge.set_current_question(Some("Q1".to_string()));

    feed.publish_comment(json!({
        "id": "m-1",
        "userId": "u-1",
        "username": "  streamfan  ",
        "text": "ÉCOLE",
        "timestamp": "2024-01-01T00:00:00Z",
        "sessionId": "live-7"
    }));

    let event = next_answer(&mut rx).await;
    assert_eq!(event.payload.username, "streamfan");
    assert_eq!(event.payload.cleaned_text, "ecole");
    assert_eq!(event.payload.timestamp, 1704067200000);
    assert_eq!(event.session_id, "live-7");
}

#[tokio::test]
async fn test_cleanup_silences_the_bridge() {
    let (mut bridge, feed, mut rx, _sink) = pipeline();
    bridge.set_current_question(Some("Q1".to_string()));

    feed.publish_comment(legacy("before", "yes"));
    assert_eq!(next_answer(&mut rx).await.payload.username, "before");

    bridge.cleanup();
    bridge.cleanup();

    bridge.set_current_question(Some("Q1".to_string()));
    feed.publish_comment(legacy("after", "no"));
    assert_eq!(
        bridge.dispatch(&SourceEvent::Comment(legacy("after", "no"))),
        DispatchOutcome::Detached
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broken_broadcaster_is_contained() {
    struct Broken;

    impl AnswerBroadcaster for Broken {
        fn broadcast(&self, _: AnswerEvent) -> Result<(), BroadcastError> {
            Err(BroadcastError::Failed("overlay offline".to_string()))
        }
    }

    let sink = Arc::new(RecordingSink::default());
    let mut bridge = EventBridge::new(sink.clone());
    bridge.initialize(&ChatFeed::new(8), Arc::new(Broken));
    bridge.set_current_question(Some("Q1".to_string()));

    for i in 0..3 {
        assert_eq!(
            bridge.dispatch(&SourceEvent::Comment(legacy("v", &format!("a{}", i)))),
            DispatchOutcome::Failed
        );
    }

    let errors = sink.errors.lock().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|(msg, sev)| *sev == Severity::High && msg.contains("overlay offline")));
}

#[tokio::test]
async fn test_lagging_bridge_skips_oldest_and_keeps_order() {
    let (bridge, feed, mut rx, sink) = pipeline_with_capacity(4);
    bridge.set_current_question(Some("Q1".to_string()));

    // the consumer task cannot run before the first await, so the feed overflows
    for i in 0..10 {
        feed.publish_comment(legacy("viewer", &format!("c{}", i)));
    }

    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(next_answer(&mut rx).await.payload.cleaned_text);
    }
    assert_eq!(received, vec!["c6", "c7", "c8", "c9"]);

    wait_for_metric(&sink, telemetry::METRIC_FEED_LAGGED, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
}
