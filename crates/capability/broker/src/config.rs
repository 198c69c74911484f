use ps_config::AppConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// 设备接入参数。
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub bind_addr: SocketAddr,
    /// 无任何上行字节的最长时间
    pub idle_timeout: Duration,
    /// 状态页两段窗口之间的轮询间隔
    pub poll_interval: Duration,
    pub max_frame_bytes: usize,
    /// 握手完成后是否自动轮询状态页
    pub polling: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 18760)),
            idle_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            max_frame_bytes: 64 * 1024,
            polling: true,
        }
    }
}

impl From<&AppConfig> for BrokerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bind_addr: config.broker_addr,
            idle_timeout: config.idle_timeout(),
            poll_interval: config.poll_interval(),
            max_frame_bytes: config.max_frame_bytes,
            polling: true,
        }
    }
}
