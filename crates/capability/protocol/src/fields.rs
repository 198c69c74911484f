//! 页面字段描述表
//!
//! 静态字面量表：字段名、页面、字偏移、解码方式。进程内只读共享。

use crate::types::{CONTROL_PAGE, STATUS_PAGE, WIFI_PAGE};

/// 电池包字段中电芯电压相对包号的字偏移
pub const PACK_CELL_OFFSET: u16 = 9;
/// 每个电池包的电芯数
pub const PACK_CELL_COUNT: u16 = 16;

/// 多字自定义解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomDecoder {
    /// 年、月、日、时、分、秒各一字节（年为原始字节，不做 +2000）
    DateTime,
    /// 时、分各一字节
    ClockTime,
    /// 相邻字节交换的 IPv4 地址
    Ipv4,
    /// 相邻字节交换的 MAC 地址
    Mac,
    /// 相邻字节交换的定长字符串
    SwappedString,
    /// 包号 + 电芯电压数组（1/100 V）
    Packs,
}

/// 字段解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    UInt,
    Bool,
    Str { words: u16 },
    Enum { labels: &'static [(u16, &'static str)] },
    Custom { decoder: CustomDecoder, words: u16 },
}

impl FieldKind {
    /// 字段占用的字数
    pub const fn words(&self) -> u16 {
        match self {
            Self::UInt | Self::Bool | Self::Enum { .. } => 1,
            Self::Str { words } => *words,
            Self::Custom { words, .. } => *words,
        }
    }
}

/// 字段描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub page: u8,
    pub offset: u16,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// 字段结束位置（不含）
    pub const fn end(&self) -> u16 {
        self.offset + self.kind.words()
    }
}

pub const UPS_MODES: &[(u16, &str)] = &[
    (1, "Customized UPS"),
    (2, "PV Priority UPS"),
    (3, "Standard UPS"),
    (4, "Time Control UPS"),
];

pub const TIME_CONTROL_MODES: &[(u16, &str)] = &[(1, "Charge"), (2, "Discharge")];

pub const AUTO_SLEEP: &[(u16, &str)] = &[(2, "30s"), (3, "1 min"), (4, "5 min"), (5, "Never")];

const fn uint(name: &'static str, page: u8, offset: u16) -> FieldDescriptor {
    FieldDescriptor {
        name,
        page,
        offset,
        kind: FieldKind::UInt,
    }
}

const fn boolean(name: &'static str, page: u8, offset: u16) -> FieldDescriptor {
    FieldDescriptor {
        name,
        page,
        offset,
        kind: FieldKind::Bool,
    }
}

const fn string(name: &'static str, page: u8, offset: u16, words: u16) -> FieldDescriptor {
    FieldDescriptor {
        name,
        page,
        offset,
        kind: FieldKind::Str { words },
    }
}

const fn enumeration(
    name: &'static str,
    page: u8,
    offset: u16,
    labels: &'static [(u16, &'static str)],
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        page,
        offset,
        kind: FieldKind::Enum { labels },
    }
}

const fn custom(
    name: &'static str,
    page: u8,
    offset: u16,
    decoder: CustomDecoder,
    words: u16,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        page,
        offset,
        kind: FieldKind::Custom { decoder, words },
    }
}

/// 全部字段
pub static FIELDS: &[FieldDescriptor] = &[
    // 状态页
    string("device_type", STATUS_PAGE, 0x0A, 6),
    uint("solar_power", STATUS_PAGE, 0x24),
    uint("grid_power", STATUS_PAGE, 0x25),
    uint("ac_output_power", STATUS_PAGE, 0x26),
    uint("dc_output_power", STATUS_PAGE, 0x27),
    uint("total_battery_percent", STATUS_PAGE, 0x2B),
    boolean("ac_output_on", STATUS_PAGE, 0x30),
    boolean("dc_output_on", STATUS_PAGE, 0x31),
    uint("pack_battery_percent", STATUS_PAGE, 0x5E),
    uint("pack_num", STATUS_PAGE, 0x60),
    custom(
        "packs",
        STATUS_PAGE,
        0x60,
        CustomDecoder::Packs,
        PACK_CELL_OFFSET + PACK_CELL_COUNT,
    ),
    // 控制页
    enumeration("ups_mode", CONTROL_PAGE, 0xB9, UPS_MODES),
    uint("pack_num", CONTROL_PAGE, 0xBE),
    boolean("ac_output_on", CONTROL_PAGE, 0xBF),
    boolean("dc_output_on", CONTROL_PAGE, 0xC0),
    boolean("grid_charge_on", CONTROL_PAGE, 0xC3),
    boolean("time_control_on", CONTROL_PAGE, 0xC5),
    uint("battery_range_start", CONTROL_PAGE, 0xC7),
    uint("battery_range_end", CONTROL_PAGE, 0xC8),
    custom("device_time", CONTROL_PAGE, 0xD7, CustomDecoder::DateTime, 3),
    boolean("bluetooth_connected", CONTROL_PAGE, 0xDC),
    enumeration("time_one_mode", CONTROL_PAGE, 0xDF, TIME_CONTROL_MODES),
    custom("time_one_start", CONTROL_PAGE, 0xE0, CustomDecoder::ClockTime, 1),
    custom("time_one_end", CONTROL_PAGE, 0xE1, CustomDecoder::ClockTime, 1),
    enumeration("time_two_mode", CONTROL_PAGE, 0xE2, TIME_CONTROL_MODES),
    custom("time_two_start", CONTROL_PAGE, 0xE3, CustomDecoder::ClockTime, 1),
    custom("time_two_end", CONTROL_PAGE, 0xE4, CustomDecoder::ClockTime, 1),
    enumeration("time_three_mode", CONTROL_PAGE, 0xE5, TIME_CONTROL_MODES),
    custom("time_three_start", CONTROL_PAGE, 0xE6, CustomDecoder::ClockTime, 1),
    custom("time_three_end", CONTROL_PAGE, 0xE7, CustomDecoder::ClockTime, 1),
    enumeration("time_four_mode", CONTROL_PAGE, 0xE8, TIME_CONTROL_MODES),
    custom("time_four_start", CONTROL_PAGE, 0xE9, CustomDecoder::ClockTime, 1),
    custom("time_four_end", CONTROL_PAGE, 0xEA, CustomDecoder::ClockTime, 1),
    enumeration("time_five_mode", CONTROL_PAGE, 0xEB, TIME_CONTROL_MODES),
    custom("time_five_start", CONTROL_PAGE, 0xEC, CustomDecoder::ClockTime, 1),
    custom("time_five_end", CONTROL_PAGE, 0xED, CustomDecoder::ClockTime, 1),
    enumeration("time_six_mode", CONTROL_PAGE, 0xEE, TIME_CONTROL_MODES),
    custom("time_six_start", CONTROL_PAGE, 0xEF, CustomDecoder::ClockTime, 1),
    custom("time_six_end", CONTROL_PAGE, 0xF0, CustomDecoder::ClockTime, 1),
    enumeration("auto_sleep", CONTROL_PAGE, 0xF5, AUTO_SLEEP),
    // Wi-Fi 页
    custom("local_ip", WIFI_PAGE, 0x8C, CustomDecoder::Ipv4, 2),
    custom("mac_address", WIFI_PAGE, 0x8E, CustomDecoder::Mac, 3),
    custom("wifi_ssid", WIFI_PAGE, 0x99, CustomDecoder::SwappedString, 16),
    custom("wifi_password", WIFI_PAGE, 0xA9, CustomDecoder::SwappedString, 16),
    uint("wifi_signal_strength", WIFI_PAGE, 0xB9),
];

/// 某页面的全部字段
pub fn fields_for_page(page: u8) -> impl Iterator<Item = &'static FieldDescriptor> {
    FIELDS.iter().filter(move |field| field.page == page)
}

/// 按页面和名称查找字段
pub fn find_field(page: u8, name: &str) -> Option<&'static FieldDescriptor> {
    fields_for_page(page).find(|field| field.name == name)
}
