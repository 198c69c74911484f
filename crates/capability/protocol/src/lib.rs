//! # 线路协议能力模块
//!
//! 纯函数层，不做任何 IO：
//! - **私有握手**：MQTT 保留类型 0 承载的两个握手包；
//! - **MQTT 子集**：CONNECT / SUBSCRIBE / PUBLISH / PINGREQ / DISCONNECT（编解码基于 `rumqttc::mqttbytes`）；
//! - **发布负载**：范围响应、单字段更新、范围更新；
//! - **页面与字段**：512 字节页面镜像 + 静态字段描述表；
//! - **下行命令**：范围查询、单字段写入、范围写入（带 CRC16 尾）。
//!
//! ## 数据流
//!
//! ```text
//! TCP 字节流
//!       │
//!       ├── decode_handshake ──► Hello / Identify
//!       │
//!       └── decode_frame ──► Publish.payload
//!                                  │
//!                                  ▼
//!                            parse_payload ──► PageSet.update
//!                                  │
//!                                  ▼
//!                            codec::decode ──► ParsedFields ──► DeviceEvent
//!
//! Command::encode ──► encode_publish("SUB/<型号>/<序列号>") ──► TCP
//! ```

mod checksum;
mod codec;
mod command;
mod error;
mod fields;
mod frame;
mod handshake;
mod page;
mod publish;
mod types;

pub use checksum::{CRC_INIT, append_crc, crc16, verify_crc};
pub use codec::decode;
pub use command::{
    COMMAND_MARKER, Command, FieldUpdate, RangeQuery, RangeUpdate, STATUS_HIGH_WINDOW,
    STATUS_LOW_WINDOW,
};
pub use error::ProtocolError;
pub use fields::{
    AUTO_SLEEP, CustomDecoder, FIELDS, FieldDescriptor, FieldKind, PACK_CELL_COUNT,
    PACK_CELL_OFFSET, TIME_CONTROL_MODES, UPS_MODES, fields_for_page, find_field,
};
pub use frame::{Frame, decode_frame, encode_connack, encode_pingresp, encode_publish, encode_suback};
pub use handshake::{
    HANDSHAKE_LEAD, HandshakePacket, IDENTIFY_ACK, TAG_HELLO, TAG_IDENTIFY, decode_handshake,
    hello_ack, parse_identity,
};
pub use page::{DataPage, PageSet};
pub use publish::{DevicePayload, infer_range_window, parse_payload};
pub use types::*;
