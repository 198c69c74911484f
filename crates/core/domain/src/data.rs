use std::collections::BTreeMap;

/// 单个电池包的电芯信息。
#[derive(Debug, Clone, PartialEq)]
pub struct PackInfo {
    pub pack_num: u16,
    /// 电芯电压（伏），已按 1/100 缩放。
    pub voltages: Vec<f64>,
}

/// 解码后的字段值。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    UInt(u16),
    Bool(bool),
    Str(String),
    /// 枚举标签（来自静态标签表）。
    Enum(&'static str),
    Packs(Vec<PackInfo>),
}

impl FieldValue {
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::UInt(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            Self::Enum(label) => Some(label),
            _ => None,
        }
    }

    pub fn as_packs(&self) -> Option<&[PackInfo]> {
        match self {
            Self::Packs(packs) => Some(packs.as_slice()),
            _ => None,
        }
    }
}

/// 一次上报解析出的字段集合（字段名 → 值）。
pub type ParsedFields = BTreeMap<&'static str, FieldValue>;

/// 设备状态快照：设备型号 + 本次解析出的字段。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub device_type: String,
    pub fields: ParsedFields,
}

impl DeviceState {
    pub fn new(device_type: impl Into<String>, fields: ParsedFields) -> Self {
        Self {
            device_type: device_type.into(),
            fields,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// 事件总线上传递的设备事件。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    /// 客户端标识（设备序列号）。
    pub client_id: String,
    pub state: DeviceState,
}
