//! 网关运行配置加载。

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// 帧长度下限（一次完整页面响应 + 帧头）
pub const MIN_FRAME_BYTES: usize = 1024;

/// 配置加载错误；所有键都有默认值，只有取值非法会失败。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// 设备接入监听地址
    pub broker_addr: SocketAddr,
    /// HTTP 巡检接口地址
    pub http_addr: SocketAddr,
    pub idle_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub max_frame_bytes: usize,
    pub http_enabled: bool,
    pub metrics_enabled: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置（未设置的键取默认值）。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker_addr = read_addr_with_default(&lookup, "PS_BROKER_ADDR", "0.0.0.0:18760")?;
        let http_addr = read_addr_with_default(&lookup, "PS_HTTP_ADDR", "127.0.0.1:8080")?;
        let idle_timeout_seconds =
            read_positive_with_default(&lookup, "PS_IDLE_TIMEOUT_SECONDS", 60)?;
        let poll_interval_ms = read_positive_with_default(&lookup, "PS_POLL_INTERVAL_MS", 1000)?;
        let max_frame_bytes = read_positive_with_default(&lookup, "PS_MAX_FRAME_BYTES", 65536)?;
        if (max_frame_bytes as usize) < MIN_FRAME_BYTES {
            return Err(ConfigError::Invalid(
                "PS_MAX_FRAME_BYTES".to_string(),
                max_frame_bytes.to_string(),
            ));
        }
        let http_enabled = read_bool_with_default(&lookup, "PS_HTTP_ENABLED", true);
        let metrics_enabled = read_bool_with_default(&lookup, "PS_METRICS_ENABLED", true);

        Ok(Self {
            broker_addr,
            http_addr,
            idle_timeout_seconds,
            poll_interval_ms,
            max_frame_bytes: max_frame_bytes as usize,
            http_enabled,
            metrics_enabled,
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker_addr: SocketAddr::from(([0, 0, 0, 0], 18760)),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            idle_timeout_seconds: 60,
            poll_interval_ms: 1000,
            max_frame_bytes: 65536,
            http_enabled: true,
            metrics_enabled: true,
        }
    }
}

fn read_addr_with_default<F>(lookup: &F, key: &str, default: &str) -> Result<SocketAddr, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = read_optional(lookup, key).unwrap_or_else(|| default.to_string());
    value
        .parse::<SocketAddr>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取正整数；0 视为非法。
fn read_positive_with_default<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = read_optional(lookup, key) else {
        return Ok(default);
    };
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn read_bool_with_default<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match read_optional(lookup, key) {
        Some(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        None => default,
    }
}
