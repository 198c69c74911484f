//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 握手或帧格式错误（连接级致命）
    #[error("framing error: {0}")]
    Framing(String),

    /// 可恢复的协议错误（记录日志后继续读取）
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 未知的发布子类型
    #[error("unknown publish subtype: 0x{0:02x}")]
    UnknownSubtype(u8),

    /// 未知的页面
    #[error("unknown page: 0x{0:02x}")]
    UnknownPage(u8),

    /// 命令负载非法（如范围写入的字节数为奇数）
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// 目标设备不在线
    #[error("not connected: {0}")]
    NotConnected(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// 是否需要关闭连接。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::Io(_))
    }
}
