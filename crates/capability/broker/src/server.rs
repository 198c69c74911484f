//! 监听与连接登记
//!
//! 每个接入的 socket 先登记到存活表，再启动处理器任务；任务结束时移除。
//! 所有任务（接入循环、处理器、轮询）由同一个 `TaskTracker` 跟踪，
//! `shutdown()` 取消全部连接并等待它们退出。

use crate::client::{Client, CloseReason};
use crate::config::BrokerConfig;
use ps_events::EventBus;
use ps_protocol::{Command, ProtocolError};
use ps_telemetry::GatewayStats;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// accept 失败后的退避时间
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type ClientMap = Arc<Mutex<BTreeMap<u64, Arc<Client>>>>;

/// 设备接入服务。
pub struct Server {
    config: BrokerConfig,
    local_addr: SocketAddr,
    bus: Arc<EventBus>,
    stats: Arc<GatewayStats>,
    clients: ClientMap,
    next_id: AtomicU64,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Server {
    /// 绑定监听地址并启动接入循环；连接与命令计数写入 `stats`。
    pub async fn bind(
        config: BrokerConfig,
        bus: Arc<EventBus>,
        stats: Arc<GatewayStats>,
    ) -> Result<Arc<Self>, ProtocolError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(target: "ps.broker", addr = %local_addr, "broker_listening");

        let server = Arc::new(Self {
            config,
            local_addr,
            bus,
            stats,
            clients: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        });
        server
            .tracker
            .spawn(Arc::clone(&server).accept_loop(listener));
        Ok(server)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 当前登记的全部连接（快照拷贝，含未完成握手的连接）。
    pub async fn list_clients(&self) -> Vec<Arc<Client>> {
        self.clients.lock().await.values().cloned().collect()
    }

    /// 已完成握手（拿到序列号）的连接。
    pub async fn identified_clients(&self) -> Vec<Arc<Client>> {
        self.clients
            .lock()
            .await
            .values()
            .filter(|client| client.is_identified())
            .cloned()
            .collect()
    }

    /// 按序列号查找在线设备；同一序列号存在多条连接时取最新的一条。
    pub async fn find_client(&self, serial_number: &str) -> Result<Arc<Client>, ProtocolError> {
        let clients = self.clients.lock().await;
        clients
            .values()
            .rev()
            .find(|client| !client.is_closed() && client.serial_number() == Some(serial_number))
            .cloned()
            .ok_or_else(|| ProtocolError::NotConnected(serial_number.to_string()))
    }

    /// 向指定设备下发命令。
    pub async fn send_command(
        &self,
        serial_number: &str,
        command: impl Into<Command>,
    ) -> Result<(), ProtocolError> {
        let client = self.find_client(serial_number).await?;
        client.send_command(command).await
    }

    /// 停止接入、关闭所有连接，并等待全部任务退出。
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(target: "ps.broker", addr = %self.local_addr, "broker_stopped");
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.register(stream, peer).await,
                    Err(err) => {
                        warn!(target: "ps.broker", error = %err, "accept_failed");
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                        }
                    }
                },
            }
        }
        debug!(target: "ps.broker", "accept_loop_stopped");
    }

    async fn register(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(target: "ps.broker", peer = %peer, error = %err, "set_nodelay_failed");
        }
        let (reader, writer) = stream.into_split();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let client = Arc::new(Client::new(
            id,
            peer,
            writer,
            self.config.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.stats),
            self.cancel.child_token(),
            self.tracker.clone(),
        ));

        self.clients.lock().await.insert(id, Arc::clone(&client));
        self.stats.record_connection_accepted();
        info!(target: "ps.broker", conn_id = id, peer = %peer, "connection_accepted");

        let clients = Arc::clone(&self.clients);
        let stats = Arc::clone(&self.stats);
        self.tracker.spawn(async move {
            let reason = Arc::clone(&client).run(reader).await;
            clients.lock().await.remove(&id);
            stats.record_connection_closed();
            match &reason {
                CloseReason::Error(err) => warn!(
                    target: "ps.broker",
                    conn_id = id,
                    peer = %peer,
                    serial = client.serial_number().unwrap_or("-"),
                    error = %err,
                    "connection_closed"
                ),
                other => info!(
                    target: "ps.broker",
                    conn_id = id,
                    peer = %peer,
                    serial = client.serial_number().unwrap_or("-"),
                    reason = ?other,
                    "connection_closed"
                ),
            }
        });
    }
}
