//! 页面字段解码
//!
//! `decode(page, base_offset, bytes)` 为纯函数：只解码字节范围完整落在
//! 本次上报窗口内的字段，其余字段直接缺省，不报错、不填默认值。

use crate::fields::{
    fields_for_page, CustomDecoder, FieldDescriptor, FieldKind, PACK_CELL_COUNT, PACK_CELL_OFFSET,
};
use crate::page::{read_word, trimmed_string};
use domain::{FieldValue, PackInfo, ParsedFields};
use tracing::debug;

/// 解码一段页面数据。
///
/// `base_offset` 为 `bytes` 首字节对应的字偏移；奇数尾字节忽略。
pub fn decode(page: u8, base_offset: u16, bytes: &[u8]) -> ParsedFields {
    let base = base_offset as usize;
    let window_end = base + bytes.len() / 2;
    let mut parsed = ParsedFields::new();

    for field in fields_for_page(page) {
        let start = field.offset as usize;
        let end = field.end() as usize;
        if start < base || end > window_end {
            continue;
        }

        let raw = &bytes[(start - base) * 2..(end - base) * 2];
        match decode_field(field, raw) {
            Some(value) => {
                parsed.insert(field.name, value);
            }
            None => {
                debug!(
                    target: "ps.protocol",
                    page = page,
                    field = field.name,
                    raw = ?raw,
                    "field_decode_skipped"
                );
            }
        }
    }

    parsed
}

/// 解码单个字段；`raw` 恰好为字段宽度。未映射的枚举值返回 None。
fn decode_field(field: &FieldDescriptor, raw: &[u8]) -> Option<FieldValue> {
    match field.kind {
        FieldKind::UInt => read_word(raw, 0).map(FieldValue::UInt),
        FieldKind::Bool => read_word(raw, 0).map(|value| FieldValue::Bool(value == 1)),
        FieldKind::Str { .. } => Some(FieldValue::Str(trimmed_string(raw))),
        FieldKind::Enum { labels } => {
            let value = read_word(raw, 0)?;
            labels
                .iter()
                .find(|(key, _)| *key == value)
                .map(|(_, label)| FieldValue::Enum(*label))
        }
        FieldKind::Custom { decoder, .. } => decode_custom(decoder, raw),
    }
}

fn decode_custom(decoder: CustomDecoder, raw: &[u8]) -> Option<FieldValue> {
    match decoder {
        CustomDecoder::DateTime => {
            let [year, month, day, hour, minute, second]: [u8; 6] = raw.get(..6)?.try_into().ok()?;
            Some(FieldValue::Str(format!(
                "{month:02}-{day:02}-{year:02} {hour:02}:{minute:02}:{second:02}"
            )))
        }
        CustomDecoder::ClockTime => {
            let [hour, minute]: [u8; 2] = raw.get(..2)?.try_into().ok()?;
            Some(FieldValue::Str(format!("{hour:02}:{minute:02}")))
        }
        CustomDecoder::Ipv4 => {
            let octets = swap_pairs(raw.get(..4)?);
            let parts: Vec<String> = octets.iter().map(|octet| octet.to_string()).collect();
            Some(FieldValue::Str(parts.join(".")))
        }
        CustomDecoder::Mac => {
            let bytes = swap_pairs(raw.get(..6)?);
            let parts: Vec<String> = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
            Some(FieldValue::Str(parts.join(":")))
        }
        CustomDecoder::SwappedString => Some(FieldValue::Str(trimmed_string(&swap_pairs(raw)))),
        CustomDecoder::Packs => {
            let pack_num = read_word(raw, 0)?;
            let first_cell = PACK_CELL_OFFSET as usize;
            let voltages = (first_cell..first_cell + PACK_CELL_COUNT as usize)
                .map(|index| read_word(raw, index).map(|value| value as f64 / 100.0))
                .collect::<Option<Vec<f64>>>()?;
            Some(FieldValue::Packs(vec![PackInfo { pack_num, voltages }]))
        }
    }
}

/// 相邻字节两两交换（奇数尾字节原样保留）
fn swap_pairs(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks(2)
        .flat_map(|pair| pair.iter().rev().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::DataPage;
    use crate::types::{CONTROL_PAGE, STATUS_PAGE, WIFI_PAGE};

    fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }

    #[test]
    fn test_partial_window_yields_only_covered_fields() {
        // 覆盖 [0x24, 0x28)
        let bytes = words(&[420, 15, 230, 12]);
        let parsed = decode(STATUS_PAGE, 0x24, &bytes);

        let names: Vec<&str> = parsed.keys().copied().collect();
        assert_eq!(
            names,
            vec!["ac_output_power", "dc_output_power", "grid_power", "solar_power"]
        );
        assert_eq!(parsed["solar_power"], FieldValue::UInt(420));
        assert_eq!(parsed["grid_power"], FieldValue::UInt(15));
        assert_eq!(parsed["ac_output_power"], FieldValue::UInt(230));
        assert_eq!(parsed["dc_output_power"], FieldValue::UInt(12));
    }

    #[test]
    fn test_multi_word_field_needs_full_range() {
        // device_type 占 0x0A..0x10，窗口只到 0x0F
        let bytes = vec![b'A'; 10];
        let parsed = decode(STATUS_PAGE, 0x0A, &bytes);
        assert!(parsed.is_empty());

        let mut bytes = b"AC300".to_vec();
        bytes.resize(12, 0);
        let parsed = decode(STATUS_PAGE, 0x0A, &bytes);
        assert_eq!(parsed["device_type"], FieldValue::Str("AC300".to_string()));
    }

    #[test]
    fn test_wrong_page_decodes_nothing() {
        let bytes = words(&[420, 15, 230, 12]);
        assert!(decode(WIFI_PAGE, 0x24, &bytes).is_empty());
        assert!(decode(0x42, 0x24, &bytes).is_empty());
    }

    #[test]
    fn test_enum_unmapped_value_is_omitted() {
        let mut page = DataPage::new();
        page.update(0xB9, &words(&[9])).unwrap();
        page.update(0xF5, &words(&[5])).unwrap();

        let parsed = decode(CONTROL_PAGE, 0, page.as_bytes());
        assert!(!parsed.contains_key("ups_mode"));
        assert_eq!(parsed["auto_sleep"], FieldValue::Enum("Never"));
    }

    #[test]
    fn test_round_trip_through_page() {
        let mut page = DataPage::new();
        page.update(0xB9, &words(&[3])).unwrap();
        page.update(0xBF, &words(&[1, 0])).unwrap();
        page.update(0xC7, &words(&[20, 90])).unwrap();
        page.update(0xD7, &[24, 6, 15, 13, 5, 9]).unwrap();
        page.update(0xDF, &[0x00, 0x01, 7, 30, 22, 0]).unwrap();

        let slice = &page.as_bytes()[0xB0 * 2..0xF0 * 2];
        let parsed = decode(CONTROL_PAGE, 0xB0, slice);
        assert_eq!(parsed["ups_mode"], FieldValue::Enum("Standard UPS"));
        assert_eq!(parsed["ac_output_on"], FieldValue::Bool(true));
        assert_eq!(parsed["dc_output_on"], FieldValue::Bool(false));
        assert_eq!(parsed["battery_range_start"], FieldValue::UInt(20));
        assert_eq!(parsed["battery_range_end"], FieldValue::UInt(90));
        assert_eq!(
            parsed["device_time"],
            FieldValue::Str("06-15-24 13:05:09".to_string())
        );
        assert_eq!(parsed["time_one_mode"], FieldValue::Enum("Charge"));
        assert_eq!(parsed["time_one_start"], FieldValue::Str("07:30".to_string()));
        assert_eq!(parsed["time_one_end"], FieldValue::Str("22:00".to_string()));
        // time_six_end 位于 0xF0，不在窗口内
        assert!(!parsed.contains_key("time_six_end"));
        assert!(!parsed.contains_key("auto_sleep"));
    }

    #[test]
    fn test_year_byte_kept_raw() {
        let raw = [200u8, 1, 2, 3, 4, 5];
        let parsed = decode(CONTROL_PAGE, 0xD7, &raw);
        assert_eq!(
            parsed["device_time"],
            FieldValue::Str("01-02-200 03:04:05".to_string())
        );
    }

    #[test]
    fn test_wifi_swapped_fields() {
        let mut page = DataPage::new();
        page.update(0x8C, &[168, 192, 1, 10]).unwrap();
        page.update(0x8E, &[0x1B, 0x0A, 0x3D, 0x2C, 0x5F, 0x4E]).unwrap();
        let mut ssid = b"yMiWiF".to_vec();
        ssid.resize(32, 0);
        page.update(0x99, &ssid).unwrap();
        page.update(0xB9, &words(&[77])).unwrap();

        let parsed = decode(WIFI_PAGE, 0, page.as_bytes());
        assert_eq!(parsed["local_ip"], FieldValue::Str("192.168.10.1".to_string()));
        assert_eq!(
            parsed["mac_address"],
            FieldValue::Str("0a:1b:2c:3d:4e:5f".to_string())
        );
        assert_eq!(parsed["wifi_ssid"], FieldValue::Str("MyWiFi".to_string()));
        assert_eq!(parsed["wifi_password"], FieldValue::Str(String::new()));
        assert_eq!(parsed["wifi_signal_strength"], FieldValue::UInt(77));
    }

    #[test]
    fn test_pack_cell_voltages_scaled() {
        let mut page = DataPage::new();
        page.update(0x5E, &words(&[87])).unwrap();
        page.update(0x60, &words(&[2])).unwrap();
        let cells: Vec<u16> = (0..16).map(|index| 330 + index).collect();
        page.update(0x69, &words(&cells)).unwrap();

        // 高段轮询窗口：0x46 起 127 字
        let window = &page.as_bytes()[0x46 * 2..(0x46 + 127) * 2];
        let parsed = decode(STATUS_PAGE, 0x46, window);
        assert_eq!(parsed["pack_battery_percent"], FieldValue::UInt(87));
        assert_eq!(parsed["pack_num"], FieldValue::UInt(2));
        let packs = parsed["packs"].as_packs().unwrap();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].pack_num, 2);
        assert_eq!(packs[0].voltages.len(), 16);
        assert!((packs[0].voltages[0] - 3.30).abs() < 1e-9);
        assert!((packs[0].voltages[15] - 3.45).abs() < 1e-9);
    }

    #[test]
    fn test_decode_does_not_mutate_input() {
        let bytes = words(&[1, 2, 3, 4]);
        let copy = bytes.clone();
        let _ = decode(STATUS_PAGE, 0x24, &bytes);
        assert_eq!(bytes, copy);
    }
}
