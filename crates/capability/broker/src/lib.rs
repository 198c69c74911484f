//! # 设备接入能力模块
//!
//! 冒充云端 broker：监听设备 TCP 连接，完成私有握手与 MQTT 子集会话，
//! 解析上报写入页面镜像，解码后投递到事件总线；并按固定节奏轮询状态页。
//!
//! ```text
//! Server (accept loop)
//!       │  register → spawn
//!       ▼
//! Client (handler task) ──► PageSet ──► decode ──► EventBus
//!       │
//!       └── poller task ──► send_command(RangeQuery) ──► 设备
//! ```

mod client;
mod config;
mod server;

pub use client::{Client, CloseReason};
pub use config::BrokerConfig;
pub use server::Server;
