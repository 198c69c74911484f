//! 追踪初始化、请求 ID 与网关计数器。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 网关计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub connections_closed: u64,
    pub handshakes_completed: u64,
    pub frames_decoded: u64,
    pub framing_errors: u64,
    pub protocol_errors: u64,
    pub publishes_decoded: u64,
    pub payloads_dropped: u64,
    pub events_published: u64,
    pub subscriber_failures: u64,
    pub commands_sent: u64,
    pub command_failures: u64,
}

impl StatsSnapshot {
    /// 当前存活连接数
    pub fn active_connections(&self) -> u64 {
        self.connections_accepted
            .saturating_sub(self.connections_closed)
    }
}

/// 网关计数器；由进程入口创建，以 `Arc` 注入总线与接入服务。
#[derive(Default)]
pub struct GatewayStats {
    connections_accepted: AtomicU64,
    connections_closed: AtomicU64,
    handshakes_completed: AtomicU64,
    frames_decoded: AtomicU64,
    framing_errors: AtomicU64,
    protocol_errors: AtomicU64,
    publishes_decoded: AtomicU64,
    payloads_dropped: AtomicU64,
    events_published: AtomicU64,
    subscriber_failures: AtomicU64,
    commands_sent: AtomicU64,
    command_failures: AtomicU64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            publishes_decoded: self.publishes_decoded.load(Ordering::Relaxed),
            payloads_dropped: self.payloads_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            subscriber_failures: self.subscriber_failures.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
        }
    }

    /// 记录接入连接。
    pub fn record_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录关闭连接。
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录完成握手。
    pub fn record_handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录解码的 MQTT 帧。
    pub fn record_frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录致命帧错误（连接随之关闭）。
    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录可恢复协议错误。
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录成功解析的设备上报。
    pub fn record_publish_decoded(&self) {
        self.publishes_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录丢弃的设备上报（未知子类型、无法定位窗口等）。
    pub fn record_payload_dropped(&self) {
        self.payloads_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录投递到事件总线的事件。
    pub fn record_event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录订阅者失败（返回错误或 panic）。
    pub fn record_subscriber_failure(&self) {
        self.subscriber_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录下发成功的命令。
    pub fn record_command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录下发失败的命令。
    pub fn record_command_failure(&self) {
        self.command_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}
