//! 私有握手
//!
//! MQTT 报文类型 0 为保留值，设备借用它在 CONNECT 之前发送两个握手包：
//!
//! ```text
//! 00 | tag | len(u16 BE) | payload[len]
//! tag 1：IoT 标识            → 回复 00 01 00 04 + (当前时间 - 8h, u32 BE)
//! tag 2："<型号>&<序列号>"   → 回复 00 02 00 01 01
//! ```

use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};
use domain::DeviceIdentity;

/// 握手包首字节
pub const HANDSHAKE_LEAD: u8 = 0x00;
/// 握手第一包标记
pub const TAG_HELLO: u8 = 0x01;
/// 握手第二包标记
pub const TAG_IDENTIFY: u8 = 0x02;

/// 第二包确认
pub const IDENTIFY_ACK: [u8; 5] = [HANDSHAKE_LEAD, TAG_IDENTIFY, 0x00, 0x01, 0x01];

/// 时间戳偏移（8 小时）
const CLOCK_SHIFT_SECS: u64 = 8 * 60 * 60;

const HEADER_LEN: usize = 4;

/// 握手包
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePacket {
    /// 第一包：不透明的 IoT 标识
    Hello { iot_id: Bytes },
    /// 第二包：设备身份
    Identify(DeviceIdentity),
    /// 未知标记（调用方视为致命错误）
    Unrecognized { tag: u8 },
}

/// 从缓冲区解码一个握手包；字节不足时返回 `Ok(None)`。
pub fn decode_handshake(
    buf: &mut BytesMut,
    max_frame: usize,
) -> Result<Option<HandshakePacket>, ProtocolError> {
    let Some(&lead) = buf.first() else {
        return Ok(None);
    };
    if lead != HANDSHAKE_LEAD {
        return Err(ProtocolError::Framing(format!(
            "expected handshake lead byte, got 0x{lead:02x}"
        )));
    }
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let tag = buf[1];
    let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if HEADER_LEN + len > max_frame {
        return Err(ProtocolError::Framing(format!(
            "handshake payload of {len} bytes exceeds limit"
        )));
    }
    if buf.len() < HEADER_LEN + len {
        return Ok(None);
    }

    let mut packet = buf.split_to(HEADER_LEN + len).freeze();
    packet.advance(HEADER_LEN);

    let decoded = match tag {
        TAG_HELLO => HandshakePacket::Hello { iot_id: packet },
        TAG_IDENTIFY => HandshakePacket::Identify(parse_identity(&packet)?),
        other => HandshakePacket::Unrecognized { tag: other },
    };
    Ok(Some(decoded))
}

/// 解析 `"<型号>&<序列号>"`
pub fn parse_identity(payload: &[u8]) -> Result<DeviceIdentity, ProtocolError> {
    let text = String::from_utf8_lossy(payload);
    let Some((device_type, serial_number)) = text.split_once('&') else {
        return Err(ProtocolError::Framing(format!(
            "identity without separator: {text:?}"
        )));
    };
    if device_type.is_empty() || serial_number.is_empty() {
        return Err(ProtocolError::Framing(format!("incomplete identity: {text:?}")));
    }
    Ok(DeviceIdentity::new(device_type, serial_number))
}

/// 第一包确认：`00 01 00 04` + (now - 8h) 的 u32 大端秒数
pub fn hello_ack(now_epoch_secs: u64) -> [u8; 8] {
    let stamp = now_epoch_secs.saturating_sub(CLOCK_SHIFT_SECS) as u32;
    let [a, b, c, d] = stamp.to_be_bytes();
    [HANDSHAKE_LEAD, TAG_HELLO, 0x00, 0x04, a, b, c, d]
}
