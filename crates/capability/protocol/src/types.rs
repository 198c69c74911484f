//! 协议相关常量与小工具

/// 状态页（实时遥测）
pub const STATUS_PAGE: u8 = 0x00;
/// 控制页（开关、UPS 模式、定时）
pub const CONTROL_PAGE: u8 = 0x0B;
/// Wi-Fi 配置页
pub const WIFI_PAGE: u8 = 0x13;

/// 每页字数（16 位字）
pub const PAGE_WORDS: usize = 256;
/// 每页字节数
pub const PAGE_BYTES: usize = PAGE_WORDS * 2;

/// 发布负载子类型：范围查询 / 范围响应
pub const SUBTYPE_RANGE: u8 = 0x03;
/// 发布负载子类型：单字段写入
pub const SUBTYPE_FIELD_UPDATE: u8 = 0x06;
/// 发布负载子类型：范围写入
pub const SUBTYPE_RANGE_UPDATE: u8 = 0x10;

/// 已知页面的名称。
pub fn page_name(page: u8) -> Option<&'static str> {
    match page {
        STATUS_PAGE => Some("status"),
        CONTROL_PAGE => Some("control"),
        WIFI_PAGE => Some("wifi"),
        _ => None,
    }
}

/// 获取当前 Unix 时间戳（秒）
pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
