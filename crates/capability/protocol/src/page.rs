//! 页面缓冲区
//!
//! 每页 512 字节、按 16 位字寻址。状态页、控制页、Wi-Fi 页各一份，
//! 由连接处理器持有，随上报原地更新，供巡检接口读取快照。

use crate::error::ProtocolError;
use crate::types::{CONTROL_PAGE, PAGE_BYTES, STATUS_PAGE, WIFI_PAGE};

/// 单页寄存器缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPage {
    data: [u8; PAGE_BYTES],
}

impl Default for DataPage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPage {
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_BYTES],
        }
    }

    /// 原始字节（只读）
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// 原始字节拷贝
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// 从字偏移处写入数据；越界时整体拒绝。
    pub fn update(&mut self, offset: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let start = offset as usize * 2;
        let end = start + data.len();
        if end > PAGE_BYTES {
            return Err(ProtocolError::InvalidPayload(format!(
                "write of {} bytes at word 0x{:02x} exceeds page",
                data.len(),
                offset
            )));
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    /// 读取 16 位无符号整数（大端）
    pub fn read_u16(&self, offset: u16) -> Option<u16> {
        read_word(&self.data, offset as usize)
    }

    /// 读取布尔值（值等于 1）
    pub fn read_bool(&self, offset: u16) -> Option<bool> {
        self.read_u16(offset).map(|value| value == 1)
    }

    /// 读取定长字符串（尾部 NUL/空格裁掉）
    pub fn read_string(&self, offset: u16, words: u16) -> Option<String> {
        let start = offset as usize * 2;
        let end = start + words as usize * 2;
        self.data.get(start..end).map(trimmed_string)
    }
}

/// 读取字索引处的大端 u16
pub(crate) fn read_word(bytes: &[u8], index: usize) -> Option<u16> {
    let start = index * 2;
    let pair = bytes.get(start..start + 2)?;
    Some(u16::from_be_bytes([pair[0], pair[1]]))
}

/// 仅裁掉右侧的 NUL 与空格
pub(crate) fn trimmed_string(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|byte| *byte != 0 && *byte != b' ')
        .map(|index| index + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// 设备的三页镜像
#[derive(Debug, Clone, Default)]
pub struct PageSet {
    status: DataPage,
    control: DataPage,
    wifi: DataPage,
}

impl PageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: u8) -> Result<&DataPage, ProtocolError> {
        match page {
            STATUS_PAGE => Ok(&self.status),
            CONTROL_PAGE => Ok(&self.control),
            WIFI_PAGE => Ok(&self.wifi),
            other => Err(ProtocolError::UnknownPage(other)),
        }
    }

    pub fn get_mut(&mut self, page: u8) -> Result<&mut DataPage, ProtocolError> {
        match page {
            STATUS_PAGE => Ok(&mut self.status),
            CONTROL_PAGE => Ok(&mut self.control),
            WIFI_PAGE => Ok(&mut self.wifi),
            other => Err(ProtocolError::UnknownPage(other)),
        }
    }

    /// 将一段上报写入对应页面
    pub fn update(&mut self, page: u8, offset: u16, data: &[u8]) -> Result<(), ProtocolError> {
        self.get_mut(page)?.update(offset, data)
    }
}
