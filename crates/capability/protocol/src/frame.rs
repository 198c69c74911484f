//! MQTT 3.1.1 子集帧编解码
//!
//! 帧解析与应答编码交给 `rumqttc::mqttbytes::v4`，这里只把结果收窄为设备
//! 实际使用的报文：CONNECT、SUBSCRIBE、PUBLISH、PINGREQ、DISCONNECT。
//! 其余报文类型（含保留类型 0/15）解码为 [`Frame::Unrecognized`]，由调用方记录后忽略。
//!
//! 解码约定：
//! - 字节不足 → `Ok(None)`，不消费缓冲区；
//! - 剩余长度编码非法或帧超限 → `ProtocolError::Framing`（连接级致命）；
//! - 帧完整但报文体非法 → 消费该帧并返回 `ProtocolError::Protocol`（可恢复）。

use crate::error::ProtocolError;
use bytes::{Bytes, BytesMut};
use rumqttc::mqttbytes::v4::{
    self, ConnAck, ConnectReturnCode, Packet, PingResp, Publish, SubAck, SubscribeReasonCode,
};
use rumqttc::mqttbytes::{self, QoS};

/// 上行报文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Connect {
        client_id: String,
        keep_alive: u16,
    },
    Subscribe {
        packet_id: u16,
        topics: Vec<(String, u8)>,
    },
    Publish {
        topic: String,
        packet_id: Option<u16>,
        payload: Bytes,
    },
    PingReq,
    Disconnect,
    Unrecognized {
        packet_type: u8,
    },
}

impl Frame {
    /// 收窄为设备使用的报文；`packet_type` 取自固定头首字节。
    fn narrow(packet: Packet, packet_type: u8) -> Self {
        match packet {
            Packet::Connect(connect) => Frame::Connect {
                client_id: connect.client_id,
                keep_alive: connect.keep_alive,
            },
            Packet::Subscribe(subscribe) => Frame::Subscribe {
                packet_id: subscribe.pkid,
                topics: subscribe
                    .filters
                    .into_iter()
                    .map(|filter| (filter.path, filter.qos as u8))
                    .collect(),
            },
            Packet::Publish(publish) => Frame::Publish {
                packet_id: (publish.qos != QoS::AtMostOnce).then_some(publish.pkid),
                topic: publish.topic,
                payload: publish.payload,
            },
            Packet::PingReq => Frame::PingReq,
            Packet::Disconnect => Frame::Disconnect,
            _ => Frame::Unrecognized { packet_type },
        }
    }
}

/// 从缓冲区解码一帧。
pub fn decode_frame(buf: &mut BytesMut, max_frame: usize) -> Result<Option<Frame>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let buffered = buf.len();
    let packet_type = buf[0] >> 4;
    match v4::read(buf, max_frame) {
        Ok(packet) => Ok(Some(Frame::narrow(packet, packet_type))),
        // 固定头不完整或帧未收齐时 rumqttc 不消费缓冲区
        Err(mqttbytes::Error::InsufficientBytes(_)) if buf.len() == buffered => Ok(None),
        // 保留类型 0/15：整帧已被切走
        Err(mqttbytes::Error::InvalidPacketType(_)) if buf.len() < buffered => {
            Ok(Some(Frame::Unrecognized { packet_type }))
        }
        Err(err) if buf.len() < buffered => Err(ProtocolError::Protocol(format!(
            "malformed mqtt packet: {err}"
        ))),
        Err(err) => Err(ProtocolError::Framing(format!("mqtt framing: {err}"))),
    }
}

fn encode_with(
    write: impl FnOnce(&mut BytesMut) -> Result<usize, mqttbytes::Error>,
) -> Result<Bytes, ProtocolError> {
    let mut out = BytesMut::new();
    write(&mut out).map_err(|err| ProtocolError::InvalidPayload(err.to_string()))?;
    Ok(out.freeze())
}

/// CONNACK：会话不存在，连接已接受
pub fn encode_connack() -> Result<Bytes, ProtocolError> {
    encode_with(|out| ConnAck::new(ConnectReturnCode::Success, false).write(out))
}

/// SUBACK：每个主题过滤器返回 QoS 0
pub fn encode_suback(packet_id: u16, topic_count: usize) -> Result<Bytes, ProtocolError> {
    let codes = vec![SubscribeReasonCode::Success(QoS::AtMostOnce); topic_count];
    encode_with(|out| SubAck::new(packet_id, codes).write(out))
}

/// PINGRESP
pub fn encode_pingresp() -> Result<Bytes, ProtocolError> {
    encode_with(|out| PingResp.write(out))
}

/// QoS 0 PUBLISH
pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    if topic.len() > u16::MAX as usize {
        return Err(ProtocolError::InvalidPayload(format!(
            "topic too long: {} bytes",
            topic.len()
        )));
    }
    encode_with(|out| Publish::new(topic, QoS::AtMostOnce, payload.to_vec()).write(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 64 * 1024;

    fn connect_bytes(client_id: &str) -> Vec<u8> {
        let mut body = vec![0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C];
        body.extend_from_slice(&(client_id.len() as u16).to_be_bytes());
        body.extend_from_slice(client_id.as_bytes());
        let mut frame = vec![0x10, body.len() as u8];
        frame.extend_from_slice(&body);
        frame
    }

    #[test]
    fn test_decode_connect() {
        let mut buf = BytesMut::from(&connect_bytes("AC300-1234")[..]);
        let frame = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Connect {
                client_id: "AC300-1234".to_string(),
                keep_alive: 60,
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits() {
        let bytes = connect_bytes("abc");
        let mut buf = BytesMut::from(&bytes[..5]);
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), None);
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&bytes[5..]);
        assert!(matches!(
            decode_frame(&mut buf, MAX).unwrap(),
            Some(Frame::Connect { .. })
        ));
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xC0, 0x00]);
        buf.extend_from_slice(&[0xE0, 0x00]);
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), Some(Frame::PingReq));
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), Some(Frame::Disconnect));
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), None);
    }

    #[test]
    fn test_decode_subscribe() {
        let mut buf = BytesMut::from(
            &[
                0x82, 0x0A, 0x00, 0x07, 0x00, 0x05, b'P', b'U', b'B', b'/', b'#', 0x01,
            ][..],
        );
        let frame = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Subscribe {
                packet_id: 7,
                topics: vec![("PUB/#".to_string(), 1)],
            }
        );
    }

    #[test]
    fn test_decode_publish_qos1_keeps_payload() {
        let mut raw = vec![0x32, 0x0B, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x09];
        raw.extend_from_slice(&[0x01, 0x01, 0x06, 0x00]);
        let mut buf = BytesMut::from(&raw[..]);
        let frame = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Publish {
                topic: "a/b".to_string(),
                packet_id: Some(9),
                payload: Bytes::from_static(&[0x01, 0x01, 0x06, 0x00]),
            }
        );
    }

    #[test]
    fn test_unrecognized_packet_type() {
        let mut buf = BytesMut::from(&[0x40, 0x02, 0x00, 0x01][..]);
        assert_eq!(
            decode_frame(&mut buf, MAX).unwrap(),
            Some(Frame::Unrecognized { packet_type: 4 })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_malformed_body_is_recoverable() {
        let mut buf = BytesMut::from(&[0x30, 0x01, 0x00, 0xC0, 0x00][..]);
        let err = decode_frame(&mut buf, MAX).unwrap_err();
        assert!(!err.is_fatal());
        // 坏帧已被消费，后续帧仍可解码
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), Some(Frame::PingReq));
    }

    #[test]
    fn test_reserved_packet_type_is_skipped() {
        let mut buf = BytesMut::from(&[0xF0, 0x01, 0x00, 0xC0, 0x00][..]);
        assert_eq!(
            decode_frame(&mut buf, MAX).unwrap(),
            Some(Frame::Unrecognized { packet_type: 15 })
        );
        assert_eq!(decode_frame(&mut buf, MAX).unwrap(), Some(Frame::PingReq));
    }

    #[test]
    fn test_malformed_remaining_length_is_fatal() {
        let mut buf = BytesMut::from(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(decode_frame(&mut buf, MAX).unwrap_err().is_fatal());
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let mut buf = BytesMut::from(&[0x30, 0xFF, 0x01][..]);
        assert!(decode_frame(&mut buf, 64).unwrap_err().is_fatal());
    }

    #[test]
    fn test_encode_responses() {
        assert_eq!(&encode_connack().unwrap()[..], &[0x20, 0x02, 0x00, 0x00]);
        assert_eq!(&encode_pingresp().unwrap()[..], &[0xD0, 0x00]);
        assert_eq!(
            &encode_suback(7, 2).unwrap()[..],
            &[0x90, 0x04, 0x00, 0x07, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_publish_decodes_back() {
        let payload = vec![0xAA; 200];
        let bytes = encode_publish("SUB/AC300/123", &payload).unwrap();
        // 剩余长度 2 + 13 + 200 = 215，需两字节
        assert_eq!(bytes[1], 0xD7);
        assert_eq!(bytes[2], 0x01);

        let mut buf = BytesMut::from(&bytes[..]);
        match decode_frame(&mut buf, MAX).unwrap() {
            Some(Frame::Publish { topic, payload: body, packet_id }) => {
                assert_eq!(topic, "SUB/AC300/123");
                assert_eq!(packet_id, None);
                assert_eq!(&body[..], &payload[..]);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
