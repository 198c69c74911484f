//! 设备发布负载（厂商私有格式）
//!
//! 负载第 2 字节为子类型：
//! - `0x03` 范围响应：`[3]` 字节数，`[4..]` 数据；
//! - `0x06` 单字段：`[3]` 页面，`[4]` 字偏移，`[5..7]` 值；
//! - `0x10` 范围写入：`[3]` 页面，`[4]` 字偏移，`[5..7]` 字数，`[7]` 字节数，`[8..]` 数据。
//!   不带数据（设备对写入的回执）视为保活，直接忽略。

use crate::error::ProtocolError;
use crate::types::{STATUS_PAGE, SUBTYPE_FIELD_UPDATE, SUBTYPE_RANGE, SUBTYPE_RANGE_UPDATE};
use bytes::Bytes;

/// 不带数据的范围写入回执长度
const RANGE_UPDATE_ACK_LEN: usize = 9;

/// 设备上报
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePayload {
    /// 范围查询的响应（页面与偏移由查询队列决定）
    RangeResponse { data: Bytes },
    /// 单字段更新
    FieldUpdate { page: u8, offset: u8, data: Bytes },
    /// 范围更新
    RangeUpdate { page: u8, offset: u8, data: Bytes },
    /// 空范围写入（保活 / 写入回执）
    KeepAlive,
    /// 未知子类型
    Unrecognized { subtype: u8 },
}

/// 解析发布负载
pub fn parse_payload(payload: &Bytes) -> Result<DevicePayload, ProtocolError> {
    let Some(&subtype) = payload.get(2) else {
        return Err(ProtocolError::Protocol(format!(
            "publish payload too short: {} bytes",
            payload.len()
        )));
    };

    match subtype {
        SUBTYPE_RANGE => {
            let len = *require(payload, 3, "range response length")? as usize;
            let data = slice(payload, 4, len, "range response")?;
            Ok(DevicePayload::RangeResponse { data })
        }
        SUBTYPE_FIELD_UPDATE => {
            let page = *require(payload, 3, "field update page")?;
            let offset = *require(payload, 4, "field update offset")?;
            let data = slice(payload, 5, 2, "field update value")?;
            Ok(DevicePayload::FieldUpdate { page, offset, data })
        }
        SUBTYPE_RANGE_UPDATE => {
            if payload.len() <= RANGE_UPDATE_ACK_LEN {
                return Ok(DevicePayload::KeepAlive);
            }
            let page = payload[3];
            let offset = payload[4];
            let len = payload[7] as usize;
            if len == 0 {
                return Ok(DevicePayload::KeepAlive);
            }
            let data = slice(payload, 8, len, "range update")?;
            Ok(DevicePayload::RangeUpdate { page, offset, data })
        }
        other => Ok(DevicePayload::Unrecognized { subtype: other }),
    }
}

/// 队列为空时按响应长度推断窗口：140 字节 → 状态页 0x00，254 字节 → 状态页 0x46。
pub fn infer_range_window(len: usize) -> Option<(u8, u16)> {
    match len {
        140 => Some((STATUS_PAGE, 0x00)),
        254 => Some((STATUS_PAGE, 0x46)),
        _ => None,
    }
}

fn require<'a>(payload: &'a Bytes, index: usize, what: &str) -> Result<&'a u8, ProtocolError> {
    payload
        .get(index)
        .ok_or_else(|| ProtocolError::Protocol(format!("truncated {what}")))
}

fn slice(payload: &Bytes, start: usize, len: usize, what: &str) -> Result<Bytes, ProtocolError> {
    if payload.len() < start + len {
        return Err(ProtocolError::Protocol(format!(
            "truncated {what}: need {} bytes, got {}",
            start + len,
            payload.len()
        )));
    }
    Ok(payload.slice(start..start + len))
}
