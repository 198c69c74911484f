use async_trait::async_trait;
use domain::{DeviceEvent, DeviceState, FieldValue, ParsedFields};
use ps_events::{EventBus, EventBusError, EventSubscriber, SubscriberError};
use ps_telemetry::GatewayStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    async fn seen(&self) -> Vec<String> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl EventSubscriber for Recorder {
    async fn handle_event(&self, event: &DeviceEvent) -> Result<(), SubscriberError> {
        self.seen.lock().await.push(event.client_id.clone());
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl EventSubscriber for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle_event(&self, _event: &DeviceEvent) -> Result<(), SubscriberError> {
        Err(SubscriberError::Failed("boom".to_string()))
    }
}

struct Panicking;

#[async_trait]
impl EventSubscriber for Panicking {
    async fn handle_event(&self, _event: &DeviceEvent) -> Result<(), SubscriberError> {
        panic!("subscriber panic");
    }
}

fn event(client_id: &str) -> DeviceEvent {
    let mut fields = ParsedFields::new();
    fields.insert("solar_power", FieldValue::UInt(420));
    DeviceEvent {
        client_id: client_id.to_string(),
        state: DeviceState::new("AC300", fields),
    }
}

fn new_bus() -> EventBus {
    EventBus::new(Arc::new(GatewayStats::new()))
}

async fn wait_for(recorder: &Recorder, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let seen = recorder.seen().await;
        if seen.len() >= count {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    recorder.seen().await
}

#[tokio::test]
async fn fan_out_survives_failing_and_panicking_subscribers() {
    let stats = Arc::new(GatewayStats::new());
    let bus = EventBus::new(stats.clone());
    bus.start();

    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    bus.subscribe(Arc::new(Failing)).await;
    bus.subscribe(first.clone()).await;
    bus.subscribe(Arc::new(Panicking)).await;
    bus.subscribe(second.clone()).await;

    bus.publish(event("A")).unwrap();
    bus.publish(event("B")).unwrap();

    assert_eq!(wait_for(&first, 2).await, vec!["A", "B"]);
    assert_eq!(wait_for(&second, 2).await, vec!["A", "B"]);
    bus.stop().await;

    // 计数写入注入的计数器
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.events_published, 2);
    assert_eq!(snapshot.subscriber_failures, 4);
}

#[tokio::test]
async fn subscribing_same_arc_twice_is_noop() {
    let bus = new_bus();
    let recorder = Arc::new(Recorder::default());
    assert!(bus.subscribe(recorder.clone()).await);
    assert!(!bus.subscribe(recorder.clone()).await);
    assert_eq!(bus.subscriber_count().await, 1);

    bus.start();
    bus.publish(event("A")).unwrap();
    assert_eq!(wait_for(&recorder, 1).await, vec!["A"]);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(recorder.seen().await.len(), 1);
    bus.stop().await;
}

#[tokio::test]
async fn stop_drains_queued_events_then_rejects() {
    let bus = new_bus();
    let recorder = Arc::new(Recorder::default());
    bus.subscribe(recorder.clone()).await;

    // 尚未启动时入队，启动后按序派发
    for id in ["A", "B", "C"] {
        bus.publish(event(id)).unwrap();
    }
    bus.start();
    bus.stop().await;

    assert_eq!(recorder.seen().await, vec!["A", "B", "C"]);
    assert!(matches!(bus.publish(event("D")), Err(EventBusError::Stopped)));
}

#[tokio::test]
async fn start_twice_does_not_duplicate_delivery() {
    let bus = new_bus();
    let recorder = Arc::new(Recorder::default());
    bus.subscribe(recorder.clone()).await;
    bus.start();
    bus.start();

    bus.publish(event("A")).unwrap();
    bus.stop().await;
    assert_eq!(recorder.seen().await, vec!["A"]);
}
