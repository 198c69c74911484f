use bytes::{BufMut, Bytes, BytesMut};
use domain::{DeviceIdentity, FieldValue};
use ps_protocol::{
    Command, DevicePayload, Frame, HandshakePacket, PageSet, STATUS_LOW_WINDOW, STATUS_PAGE,
    decode, decode_frame, decode_handshake, encode_publish, parse_payload,
};

const MAX: usize = 65536;

fn handshake(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x00, tag];
    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn device_publish(payload: &[u8]) -> Vec<u8> {
    let topic = b"PUB/AC300/2235000001234";
    let mut body = BytesMut::new();
    body.put_u16(topic.len() as u16);
    body.put_slice(topic);
    body.put_slice(payload);

    let mut bytes = vec![0x30, body.len() as u8];
    bytes.extend_from_slice(&body);
    bytes
}

#[test]
fn device_session_stream_decodes_in_order() {
    let mut stream = BytesMut::new();
    stream.extend_from_slice(&handshake(0x01, b"iot"));
    stream.extend_from_slice(&handshake(0x02, b"AC300&2235000001234"));

    match decode_handshake(&mut stream, MAX).unwrap() {
        Some(HandshakePacket::Hello { iot_id }) => assert_eq!(iot_id, Bytes::from_static(b"iot")),
        other => panic!("unexpected {other:?}"),
    }
    let identity = match decode_handshake(&mut stream, MAX).unwrap() {
        Some(HandshakePacket::Identify(identity)) => identity,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(identity, DeviceIdentity::new("AC300", "2235000001234"));
    assert!(stream.is_empty());

    // 范围响应：solar_power..dc_output_power
    let mut payload = vec![0x01, 0x01, 0x03, 8];
    for value in [420u16, 15, 230, 12] {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload.extend_from_slice(&[0xAA, 0xBB]);
    stream.extend_from_slice(&device_publish(&payload));
    stream.extend_from_slice(&[0xC0, 0x00]);

    let Some(Frame::Publish { payload, .. }) = decode_frame(&mut stream, MAX).unwrap() else {
        panic!("expected publish");
    };
    assert_eq!(decode_frame(&mut stream, MAX).unwrap(), Some(Frame::PingReq));

    let DevicePayload::RangeResponse { data } = parse_payload(&payload).unwrap() else {
        panic!("expected range response");
    };

    let mut pages = PageSet::new();
    pages.update(STATUS_PAGE, 0x24, &data).unwrap();
    let parsed = decode(STATUS_PAGE, 0x24, &data);
    assert_eq!(parsed["solar_power"], FieldValue::UInt(420));
    assert_eq!(parsed["dc_output_power"], FieldValue::UInt(12));
    assert_eq!(
        pages.get(STATUS_PAGE).unwrap().read_u16(0x26),
        Some(230)
    );
}

#[test]
fn outgoing_command_is_wrapped_in_publish() {
    let identity = DeviceIdentity::new("AC300", "2235000001234");
    let command = Command::from(STATUS_LOW_WINDOW).encode();
    let frame = encode_publish(&identity.command_topic(), &command).unwrap();

    let topic = identity.command_topic();
    assert_eq!(frame[0], 0x30);
    assert_eq!(frame[1] as usize, 2 + topic.len() + command.len());
    assert_eq!(&frame[4..4 + topic.len()], topic.as_bytes());
    assert_eq!(&frame[4 + topic.len()..], &command[..]);
}
