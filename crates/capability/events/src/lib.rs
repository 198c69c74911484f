//! # 事件总线
//!
//! 连接处理器把解析后的设备状态投递到无界队列，由唯一的派发任务按入队顺序
//! 依次交给每个订阅者（注册顺序）。订阅者返回错误或 panic 只记录日志，
//! 不影响其他订阅者，也不影响后续事件。
//!
//! ```text
//! Client ──publish──► mpsc (unbounded) ──► dispatch task
//!                                              │
//!                                              ├── subscriber #1
//!                                              ├── subscriber #2
//!                                              └── ...
//! ```

use async_trait::async_trait;
use domain::DeviceEvent;
use futures::FutureExt;
use ps_telemetry::GatewayStats;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 订阅者错误。
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("subscriber rejected event: {0}")]
    Rejected(String),
    #[error("subscriber failed: {0}")]
    Failed(String),
}

/// 事件总线错误。
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus stopped")]
    Stopped,
}

/// 设备事件订阅者。
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// 用于日志的名称
    fn name(&self) -> &str {
        "subscriber"
    }

    async fn handle_event(&self, event: &DeviceEvent) -> Result<(), SubscriberError>;
}

type SubscriberList = Arc<Mutex<Vec<Arc<dyn EventSubscriber>>>>;

/// 事件总线。
pub struct EventBus {
    sender: mpsc::UnboundedSender<DeviceEvent>,
    receiver: std::sync::Mutex<Option<mpsc::UnboundedReceiver<DeviceEvent>>>,
    subscribers: SubscriberList,
    stats: Arc<GatewayStats>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl EventBus {
    /// 创建总线；投递与订阅者失败计入 `stats`。
    pub fn new(stats: Arc<GatewayStats>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: std::sync::Mutex::new(Some(receiver)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            stats,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// 启动派发任务；重复调用无副作用。
    pub fn start(&self) {
        let receiver = match self.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(receiver) = receiver else {
            return;
        };

        let subscribers = self.subscribers.clone();
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        self.tracker
            .spawn(dispatch_loop(receiver, subscribers, stats, cancel));
        info!(target: "ps.events", "event_bus_started");
    }

    /// 注册订阅者；同一个 `Arc` 重复注册无效果。返回是否新增。
    pub async fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &subscriber))
        {
            return false;
        }
        debug!(target: "ps.events", subscriber = subscriber.name(), "subscriber_registered");
        subscribers.push(subscriber);
        true
    }

    /// 当前订阅者数量
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// 投递事件（不阻塞）。
    pub fn publish(&self, event: DeviceEvent) -> Result<(), EventBusError> {
        if self.cancel.is_cancelled() {
            return Err(EventBusError::Stopped);
        }
        self.sender
            .send(event)
            .map_err(|_| EventBusError::Stopped)?;
        self.stats.record_event_published();
        Ok(())
    }

    /// 停止派发任务：已入队的事件先派发完，再退出。
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(target: "ps.events", "event_bus_stopped");
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::UnboundedReceiver<DeviceEvent>,
    subscribers: SubscriberList,
    stats: Arc<GatewayStats>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            event = receiver.recv() => {
                let Some(event) = event else {
                    break;
                };
                deliver(&subscribers, &stats, &event).await;
            }
            _ = cancel.cancelled() => {
                while let Ok(event) = receiver.try_recv() {
                    deliver(&subscribers, &stats, &event).await;
                }
                break;
            }
        }
    }
}

async fn deliver(subscribers: &SubscriberList, stats: &GatewayStats, event: &DeviceEvent) {
    let subscribers = subscribers.lock().await;
    for subscriber in subscribers.iter() {
        let outcome = AssertUnwindSafe(subscriber.handle_event(event))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                stats.record_subscriber_failure();
                warn!(
                    target: "ps.events",
                    subscriber = subscriber.name(),
                    client_id = %event.client_id,
                    error = %err,
                    "subscriber_failed"
                );
            }
            Err(_) => {
                stats.record_subscriber_failure();
                warn!(
                    target: "ps.events",
                    subscriber = subscriber.name(),
                    client_id = %event.client_id,
                    "subscriber_panicked"
                );
            }
        }
    }
}
