//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub broker_addr: String,
}

/// 在线设备返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDto {
    pub serial_number: String,
    pub device_type: String,
    /// 握手第一包的 IoT 标识（hex）
    pub iot_id: Option<String>,
    pub peer_addr: String,
    pub idle_ms: u64,
    pub outstanding_queries: usize,
}

/// 页面镜像返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    pub serial_number: String,
    pub page: u8,
    pub page_name: Option<String>,
    /// 512 字节原始数据（hex）
    pub data: String,
    /// 按字段表解码后的值
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// 范围查询请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQueryRequest {
    pub page: u8,
    pub offset: u8,
    pub words: u16,
}

/// 单字段写入请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdateRequest {
    pub page: u8,
    pub offset: u8,
    pub value: u16,
}

/// 范围写入请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeUpdateRequest {
    pub page: u8,
    pub offset: u8,
    /// 写入数据（hex，字对齐）
    pub data: String,
}

/// 命令下发结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDto {
    pub serial_number: String,
    pub command: String,
    /// 编码后的负载（hex，含 CRC）
    pub encoded: String,
}

/// 网关计数器返回结构。
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatsDto {
    pub active_connections: u64,
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
