pub mod data;

pub use data::{DeviceEvent, DeviceState, FieldValue, PackInfo, ParsedFields};

/// 设备身份：握手第二包携带的 `<型号>&<序列号>`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub device_type: String,
    pub serial_number: String,
}

impl DeviceIdentity {
    /// 构造设备身份。
    pub fn new(device_type: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            serial_number: serial_number.into(),
        }
    }

    /// 下行命令的发布主题：`SUB/<型号>/<序列号>`。
    pub fn command_topic(&self) -> String {
        format!("SUB/{}/{}", self.device_type, self.serial_number)
    }
}
