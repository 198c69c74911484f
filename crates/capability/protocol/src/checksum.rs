//! 下行命令 CRC16 校验
//!
//! 反射多项式 0xA001，初值 0xFE55，无输出异或，结果低字节在前。
//! 初值 0xFE55 吃掉首个标记字节 0x01 后恰好为 0xFFFF，
//! 因此等价于对其余字节做 Modbus CRC16。

/// 厂商初值
pub const CRC_INIT: u16 = 0xFE55;

const POLY: u16 = 0xA001;

/// 计算厂商 CRC16。
pub fn crc16(data: &[u8]) -> u16 {
    crc16_with_init(CRC_INIT, data)
}

pub(crate) fn crc16_with_init(init: u16, data: &[u8]) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// 在负载末尾追加 CRC（低字节在前）。
pub fn append_crc(payload: &mut Vec<u8>) {
    let crc = crc16(payload);
    payload.extend_from_slice(&crc.to_le_bytes());
}

/// 校验末尾两字节是否为前面内容的 CRC。
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    crc16(body).to_le_bytes() == [trailer[0], trailer[1]]
}
