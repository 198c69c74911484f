//! 下行命令编码
//!
//! 帧格式：`01 01` 标记 + 子类型 + 页面(1) + 字偏移(1) + 命令体 + CRC16(LE)。
//!
//! | 命令 | 子类型 | 命令体 |
//! |------|--------|--------|
//! | 范围查询 | 0x03 | 字数 u16 BE |
//! | 单字段写入 | 0x06 | 值 u16 BE |
//! | 范围写入 | 0x10 | 字数 u16 BE + 字节数 u8 + 数据 |

use crate::checksum::append_crc;
use crate::error::ProtocolError;
use crate::types::{STATUS_PAGE, SUBTYPE_FIELD_UPDATE, SUBTYPE_RANGE, SUBTYPE_RANGE_UPDATE};

/// 命令帧标记字节
pub const COMMAND_MARKER: [u8; 2] = [0x01, 0x01];

/// 状态页低段轮询窗口（0x00 起 70 字，响应 140 字节）
pub const STATUS_LOW_WINDOW: RangeQuery = RangeQuery {
    page: STATUS_PAGE,
    offset: 0x00,
    words: 70,
};

/// 状态页高段轮询窗口（0x46 起 127 字，响应 254 字节）
pub const STATUS_HIGH_WINDOW: RangeQuery = RangeQuery {
    page: STATUS_PAGE,
    offset: 0x46,
    words: 127,
};

/// 范围查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    pub page: u8,
    pub offset: u8,
    pub words: u16,
}

/// 单字段写入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldUpdate {
    pub page: u8,
    pub offset: u8,
    pub value: u16,
}

/// 范围写入（数据按字对齐）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpdate {
    page: u8,
    offset: u8,
    data: Vec<u8>,
}

impl RangeUpdate {
    /// 构造范围写入；字节数必须为偶数且不超过 255。
    pub fn new(page: u8, offset: u8, data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() % 2 != 0 {
            return Err(ProtocolError::InvalidPayload(format!(
                "range update data must be word aligned, got {} bytes",
                data.len()
            )));
        }
        if data.len() > u8::MAX as usize {
            return Err(ProtocolError::InvalidPayload(format!(
                "range update data too long: {} bytes",
                data.len()
            )));
        }
        Ok(Self { page, offset, data })
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// 下行命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RangeQuery(RangeQuery),
    FieldUpdate(FieldUpdate),
    RangeUpdate(RangeUpdate),
}

impl Command {
    /// 子类型标记
    pub fn subtype(&self) -> u8 {
        match self {
            Self::RangeQuery(_) => SUBTYPE_RANGE,
            Self::FieldUpdate(_) => SUBTYPE_FIELD_UPDATE,
            Self::RangeUpdate(_) => SUBTYPE_RANGE_UPDATE,
        }
    }

    /// 编码为带 CRC 尾的负载。同一命令每次编码结果一致。
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&COMMAND_MARKER);
        payload.push(self.subtype());
        match self {
            Self::RangeQuery(query) => {
                payload.push(query.page);
                payload.push(query.offset);
                payload.extend_from_slice(&query.words.to_be_bytes());
            }
            Self::FieldUpdate(update) => {
                payload.push(update.page);
                payload.push(update.offset);
                payload.extend_from_slice(&update.value.to_be_bytes());
            }
            Self::RangeUpdate(update) => {
                let words = (update.data.len() / 2) as u16;
                payload.push(update.page);
                payload.push(update.offset);
                payload.extend_from_slice(&words.to_be_bytes());
                payload.push(update.data.len() as u8);
                payload.extend_from_slice(&update.data);
            }
        }
        append_crc(&mut payload);
        payload
    }
}

impl From<RangeQuery> for Command {
    fn from(query: RangeQuery) -> Self {
        Self::RangeQuery(query)
    }
}

impl From<FieldUpdate> for Command {
    fn from(update: FieldUpdate) -> Self {
        Self::FieldUpdate(update)
    }
}

impl From<RangeUpdate> for Command {
    fn from(update: RangeUpdate) -> Self {
        Self::RangeUpdate(update)
    }
}
