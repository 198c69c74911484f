pub mod response;

/// 解析页面参数：十进制、`0x` 十六进制或页面名称。
pub fn parse_page(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "status" => return Some(ps_protocol::STATUS_PAGE),
        "control" => return Some(ps_protocol::CONTROL_PAGE),
        "wifi" => return Some(ps_protocol::WIFI_PAGE),
        _ => {}
    }
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => raw.parse::<u8>().ok(),
    }
}
