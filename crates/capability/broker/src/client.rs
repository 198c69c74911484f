//! 单个设备连接的处理器
//!
//! 状态机：`AwaitingHello → AwaitingIdentify → Identified → Closed`。
//! 读半部由处理器任务独占；写半部与未完成查询队列放在同一把锁下，
//! 保证"入队查询 + 写出命令"原子完成，响应按 FIFO 与查询一一对应。

use crate::config::BrokerConfig;
use bytes::{Bytes, BytesMut};
use domain::{DeviceEvent, DeviceIdentity, DeviceState};
use ps_events::EventBus;
use ps_protocol::{
    Command, DevicePayload, Frame, HandshakePacket, IDENTIFY_ACK, PageSet, ProtocolError,
    RangeQuery, STATUS_HIGH_WINDOW, STATUS_LOW_WINDOW, decode, decode_frame, decode_handshake,
    encode_connack, encode_pingresp, encode_publish, encode_suback, hello_ack,
    infer_range_window, now_epoch_secs, page_name, parse_payload,
};
use ps_telemetry::GatewayStats;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 单次读取的预留容量
const READ_CHUNK: usize = 2048;
/// 未完成查询上限，超出时丢弃最旧的一条
const MAX_OUTSTANDING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitingHello,
    AwaitingIdentify,
    Identified,
}

/// 连接关闭原因
#[derive(Debug)]
pub enum CloseReason {
    PeerClosed,
    Disconnect,
    IdleTimeout,
    Stopped,
    Error(ProtocolError),
}

/// 单步处理结果
enum Step {
    Continue,
    NeedMore,
    Close,
}

struct Writer {
    half: Option<OwnedWriteHalf>,
    outstanding: VecDeque<RangeQuery>,
}

/// 设备连接处理器。
pub struct Client {
    id: u64,
    peer_addr: SocketAddr,
    identity: OnceLock<DeviceIdentity>,
    iot_id: OnceLock<Bytes>,
    connected_at: Instant,
    /// 最近一次收到字节的时刻（相对 connected_at 的毫秒数）
    last_activity_ms: AtomicU64,
    writer: Mutex<Writer>,
    pages: Mutex<PageSet>,
    config: BrokerConfig,
    bus: Arc<EventBus>,
    stats: Arc<GatewayStats>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        peer_addr: SocketAddr,
        write_half: OwnedWriteHalf,
        config: BrokerConfig,
        bus: Arc<EventBus>,
        stats: Arc<GatewayStats>,
        cancel: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            id,
            peer_addr,
            identity: OnceLock::new(),
            iot_id: OnceLock::new(),
            connected_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            writer: Mutex::new(Writer {
                half: Some(write_half),
                outstanding: VecDeque::new(),
            }),
            pages: Mutex::new(PageSet::new()),
            config,
            bus,
            stats,
            cancel,
            tracker,
        }
    }

    /// 连接序号（进程内唯一）
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 握手完成后才有值，型号与序列号同时设置。
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.get()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.identity().map(|identity| identity.serial_number.as_str())
    }

    pub fn device_type(&self) -> Option<&str> {
        self.identity().map(|identity| identity.device_type.as_str())
    }

    /// 握手第一包携带的 IoT 标识
    pub fn iot_id(&self) -> Option<&Bytes> {
        self.iot_id.get()
    }

    pub fn is_identified(&self) -> bool {
        self.identity.get().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 距最近一次收到字节的时长
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.connected_at.elapsed().saturating_sub(last)
    }

    /// 页面镜像的原始字节拷贝
    pub async fn snapshot_page(&self, page: u8) -> Result<Vec<u8>, ProtocolError> {
        let pages = self.pages.lock().await;
        Ok(pages.get(page)?.snapshot())
    }

    /// 尚未收到响应的范围查询数量
    pub async fn outstanding_queries(&self) -> usize {
        self.writer.lock().await.outstanding.len()
    }

    /// 请求关闭连接；处理器任务退出时释放写半部。
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// 编码并发布命令到 `SUB/<型号>/<序列号>`。
    ///
    /// 范围查询在写出前入队，与写出处于同一把锁内。
    pub async fn send_command(&self, command: impl Into<Command>) -> Result<(), ProtocolError> {
        let command = command.into();
        let identity = self
            .identity
            .get()
            .ok_or_else(|| ProtocolError::NotConnected(format!("client {} not identified", self.id)))?;
        let payload = command.encode();
        let frame = encode_publish(&identity.command_topic(), &payload)?;

        let mut writer = self.writer.lock().await;
        if self.cancel.is_cancelled() || writer.half.is_none() {
            return Err(ProtocolError::NotConnected(identity.serial_number.clone()));
        }

        let query = match &command {
            Command::RangeQuery(query) => Some(*query),
            _ => None,
        };
        if let Some(query) = query {
            if writer.outstanding.len() >= MAX_OUTSTANDING {
                let dropped = writer.outstanding.pop_front();
                warn!(
                    target: "ps.broker",
                    serial = %identity.serial_number,
                    dropped = ?dropped,
                    "outstanding_query_dropped"
                );
            }
            writer.outstanding.push_back(query);
        }

        let result = match writer.half.as_mut() {
            Some(half) => self.write_bounded(half, &frame).await,
            None => Err(std::io::ErrorKind::NotConnected.into()),
        };
        if let Err(err) = result {
            if query.is_some() {
                writer.outstanding.pop_back();
            }
            self.stats.record_command_failure();
            return Err(ProtocolError::Io(err));
        }

        self.stats.record_command_sent();
        debug!(
            target: "ps.broker",
            serial = %identity.serial_number,
            subtype = command.subtype(),
            bytes = payload.len(),
            "command_sent"
        );
        Ok(())
    }

    /// 处理器主循环；返回时连接已关闭。
    pub(crate) async fn run(self: Arc<Self>, mut reader: OwnedReadHalf) -> CloseReason {
        let mut state = SessionState::AwaitingHello;
        let mut buf = BytesMut::with_capacity(READ_CHUNK);

        let reason = 'session: loop {
            loop {
                match self.process_next(&mut state, &mut buf).await {
                    Ok(Step::Continue) => {}
                    Ok(Step::NeedMore) => break,
                    Ok(Step::Close) => break 'session CloseReason::Disconnect,
                    Err(err) if err.is_fatal() => {
                        self.stats.record_framing_error();
                        break 'session CloseReason::Error(err);
                    }
                    Err(err) => {
                        self.stats.record_protocol_error();
                        warn!(
                            target: "ps.broker",
                            conn_id = self.id,
                            serial = self.serial_number().unwrap_or("-"),
                            error = %err,
                            "protocol_error"
                        );
                    }
                }
            }

            let deadline = self.idle_deadline();
            buf.reserve(READ_CHUNK);
            tokio::select! {
                _ = self.cancel.cancelled() => break 'session CloseReason::Stopped,
                _ = tokio::time::sleep_until(deadline) => {
                    if self.idle_for() >= self.config.idle_timeout {
                        break 'session CloseReason::IdleTimeout;
                    }
                }
                read = reader.read_buf(&mut buf) => match read {
                    Ok(0) => break 'session CloseReason::PeerClosed,
                    Ok(_) => self.touch(),
                    Err(err) => break 'session CloseReason::Error(ProtocolError::Io(err)),
                },
            }
        };

        self.close().await;
        reason
    }

    fn touch(&self) {
        let elapsed = self.connected_at.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::Relaxed);
    }

    fn idle_deadline(&self) -> Instant {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.connected_at + last + self.config.idle_timeout
    }

    /// 关闭写半部；重复调用无副作用。
    async fn close(&self) {
        self.cancel.cancel();
        let half = self.writer.lock().await.half.take();
        if let Some(mut half) = half {
            let _ = half.shutdown().await;
        }
    }

    async fn process_next(
        self: &Arc<Self>,
        state: &mut SessionState,
        buf: &mut BytesMut,
    ) -> Result<Step, ProtocolError> {
        if *state == SessionState::Identified {
            return self.process_frame(buf).await;
        }

        let Some(packet) = decode_handshake(buf, self.config.max_frame_bytes)? else {
            return Ok(Step::NeedMore);
        };
        match (*state, packet) {
            (SessionState::AwaitingHello, HandshakePacket::Hello { iot_id }) => {
                debug!(target: "ps.broker", conn_id = self.id, iot_id = ?iot_id, "handshake_hello");
                let _ = self.iot_id.set(iot_id);
                self.write_raw(&hello_ack(now_epoch_secs())).await?;
                *state = SessionState::AwaitingIdentify;
            }
            (SessionState::AwaitingIdentify, HandshakePacket::Identify(identity)) => {
                self.write_raw(&IDENTIFY_ACK).await?;
                info!(
                    target: "ps.broker",
                    conn_id = self.id,
                    peer = %self.peer_addr,
                    device_type = %identity.device_type,
                    serial = %identity.serial_number,
                    "device_identified"
                );
                self.stats.record_handshake_completed();
                let _ = self.identity.set(identity);
                *state = SessionState::Identified;
                if self.config.polling {
                    self.tracker.spawn(Arc::clone(self).poll_loop());
                }
            }
            (state, packet) => {
                return Err(ProtocolError::Framing(format!(
                    "unexpected handshake packet {packet:?} in state {state:?}"
                )));
            }
        }
        Ok(Step::Continue)
    }

    async fn process_frame(&self, buf: &mut BytesMut) -> Result<Step, ProtocolError> {
        let Some(frame) = decode_frame(buf, self.config.max_frame_bytes)? else {
            return Ok(Step::NeedMore);
        };
        self.stats.record_frame_decoded();

        match frame {
            Frame::Connect {
                client_id,
                keep_alive,
            } => {
                debug!(target: "ps.broker", conn_id = self.id, client_id = %client_id, keep_alive, "mqtt_connect");
                self.write_raw(&encode_connack()?).await?;
            }
            Frame::Subscribe { packet_id, topics } => {
                debug!(target: "ps.broker", conn_id = self.id, topics = ?topics, "mqtt_subscribe");
                self.write_raw(&encode_suback(packet_id, topics.len())?).await?;
            }
            Frame::Publish { topic, payload, .. } => {
                debug!(target: "ps.broker", conn_id = self.id, topic = %topic, bytes = payload.len(), "mqtt_publish");
                self.handle_payload(&payload).await?;
            }
            Frame::PingReq => {
                self.write_raw(&encode_pingresp()?).await?;
            }
            Frame::Disconnect => return Ok(Step::Close),
            Frame::Unrecognized { packet_type } => {
                debug!(target: "ps.broker", conn_id = self.id, packet_type, "mqtt_frame_ignored");
            }
        }
        Ok(Step::Continue)
    }

    async fn handle_payload(&self, payload: &Bytes) -> Result<(), ProtocolError> {
        match parse_payload(payload)? {
            DevicePayload::RangeResponse { data } => {
                let queued = self.writer.lock().await.outstanding.pop_front();
                let window = queued
                    .map(|query| (query.page, query.offset as u16))
                    .or_else(|| infer_range_window(data.len()));
                match window {
                    Some((page, offset)) => self.apply(page, offset, &data).await,
                    None => {
                        self.stats.record_payload_dropped();
                        warn!(
                            target: "ps.broker",
                            conn_id = self.id,
                            bytes = data.len(),
                            "range_response_unmatched"
                        );
                    }
                }
            }
            DevicePayload::FieldUpdate { page, offset, data }
            | DevicePayload::RangeUpdate { page, offset, data } => {
                self.apply(page, offset as u16, &data).await;
            }
            DevicePayload::KeepAlive => {
                debug!(target: "ps.broker", conn_id = self.id, "keep_alive");
            }
            DevicePayload::Unrecognized { subtype } => {
                self.stats.record_payload_dropped();
                return Err(ProtocolError::UnknownSubtype(subtype));
            }
        }
        Ok(())
    }

    /// 写入页面镜像、解码并投递事件。
    async fn apply(&self, page: u8, offset: u16, data: &[u8]) {
        if let Err(err) = self.pages.lock().await.update(page, offset, data) {
            debug!(
                target: "ps.broker",
                conn_id = self.id,
                page,
                offset,
                error = %err,
                "page_mirror_skipped"
            );
        }

        let fields = decode(page, offset, data);
        self.stats.record_publish_decoded();
        if fields.is_empty() {
            return;
        }
        let Some(identity) = self.identity.get() else {
            return;
        };

        debug!(
            target: "ps.broker",
            serial = %identity.serial_number,
            page = page_name(page).unwrap_or("unknown"),
            offset,
            fields = fields.len(),
            "page_decoded"
        );
        let event = DeviceEvent {
            client_id: identity.serial_number.clone(),
            state: DeviceState::new(identity.device_type.clone(), fields),
        };
        if let Err(err) = self.bus.publish(event) {
            warn!(target: "ps.broker", serial = %identity.serial_number, error = %err, "event_publish_failed");
        }
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let mut writer = self.writer.lock().await;
        let Some(half) = writer.half.as_mut() else {
            return Err(ProtocolError::NotConnected(format!("client {} closed", self.id)));
        };
        self.write_bounded(half, bytes).await?;
        Ok(())
    }

    /// 轮询状态页：低段、高段交替发出。
    async fn poll_loop(self: Arc<Self>) {
        let windows = [STATUS_LOW_WINDOW, STATUS_HIGH_WINDOW];
        for query in windows.iter().cycle() {
            if let Err(err) = self.send_command(*query).await {
                if matches!(err, ProtocolError::NotConnected(_)) || self.cancel.is_cancelled() {
                    break;
                }
                warn!(target: "ps.broker", conn_id = self.id, error = %err, "poll_failed");
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        debug!(target: "ps.broker", conn_id = self.id, "poller_stopped");
    }

    /// 写出整段字节，受停止信号与空闲超时约束。
    ///
    /// 设备停止读取时写出会一直阻塞并占住写锁；超时后取消整个连接，
    /// 读循环随之退出。
    async fn write_bounded(&self, half: &mut OwnedWriteHalf, bytes: &[u8]) -> std::io::Result<()> {
        tokio::select! {
            result = tokio::time::timeout(self.config.idle_timeout, half.write_all(bytes)) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        target: "ps.broker",
                        conn_id = self.id,
                        serial = self.serial_number().unwrap_or("-"),
                        bytes = bytes.len(),
                        "write_timed_out"
                    );
                    self.cancel.cancel();
                    Err(std::io::ErrorKind::TimedOut.into())
                }
            },
            _ = self.cancel.cancelled() => Err(std::io::ErrorKind::Interrupted.into()),
        }
    }
}
