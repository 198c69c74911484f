//! Prometheus 导出
//!
//! 作为事件总线订阅者：功率写入 `*_watts` 仪表，并按梯形法累计 `*_wh` 计数器
//! （同一设备同一字段相邻两次采样的平均功率 × 间隔小时数）。
//! 所有序列带 `device_type`、`serial_number` 标签，注册在私有 Registry 中。

use async_trait::async_trait;
use domain::{DeviceEvent, FieldValue};
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use ps_events::{EventSubscriber, SubscriberError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

const DEVICE_LABELS: &[&str] = &["device_type", "serial_number"];
const PACK_LABELS: &[&str] = &["device_type", "serial_number", "pack_num"];
const CELL_LABELS: &[&str] = &["device_type", "serial_number", "pack_num", "cell_num"];

/// 导出错误。
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics text is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// 功率字段：瞬时值 + 累计电量
struct PowerMetric {
    field: &'static str,
    watts: GaugeVec,
    watt_hours: CounterVec,
}

/// 上一次采样（时刻、功率）
type SampleKey = (String, &'static str);

pub struct Exporter {
    registry: Registry,
    power: Vec<PowerMetric>,
    total_battery_percent: GaugeVec,
    pack_battery_percent: GaugeVec,
    cell_voltage: GaugeVec,
    last_samples: Mutex<HashMap<SampleKey, (Instant, f64)>>,
}

impl Exporter {
    pub fn new() -> Result<Self, ExporterError> {
        let registry = Registry::new();
        let power = [
            ("solar_power", "Current solar input", "Total solar power generation"),
            ("grid_power", "Current grid input", "Total grid input"),
            ("ac_output_power", "Current AC power output", "Cumulative AC power output"),
            ("dc_output_power", "Current DC power output", "Cumulative DC power output"),
        ]
        .into_iter()
        .map(|(field, gauge_help, counter_help)| -> Result<PowerMetric, ExporterError> {
            let watts = register_gauge(&registry, &format!("{field}_watts"), gauge_help, DEVICE_LABELS)?;
            let watt_hours = CounterVec::new(Opts::new(format!("{field}_wh"), counter_help), DEVICE_LABELS)?;
            registry.register(Box::new(watt_hours.clone()))?;
            Ok(PowerMetric {
                field,
                watts,
                watt_hours,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        let total_battery_percent = register_gauge(
            &registry,
            "total_battery_percent",
            "Total battery percent",
            DEVICE_LABELS,
        )?;
        let pack_battery_percent = register_gauge(
            &registry,
            "pack_battery_percent",
            "Pack battery percent",
            PACK_LABELS,
        )?;
        let cell_voltage = register_gauge(
            &registry,
            "cell_voltage",
            "Voltage of a single cell in a pack",
            CELL_LABELS,
        )?;

        Ok(Self {
            registry,
            power,
            total_battery_percent,
            pack_battery_percent,
            cell_voltage,
            last_samples: Mutex::new(HashMap::new()),
        })
    }

    /// 记录一次设备事件
    pub fn record(&self, event: &DeviceEvent) {
        self.record_at(event, Instant::now());
    }

    pub(crate) fn record_at(&self, event: &DeviceEvent, now: Instant) {
        let state = &event.state;
        let device_type = state.device_type.as_str();
        let serial = event.client_id.as_str();
        let labels = [device_type, serial];

        for metric in &self.power {
            let Some(watts) = state.get(metric.field).and_then(FieldValue::as_u16) else {
                continue;
            };
            let watts = f64::from(watts);
            metric.watts.with_label_values(&labels).set(watts);
            let energy = self.integrate(serial, metric.field, watts, now);
            if energy > 0.0 {
                metric.watt_hours.with_label_values(&labels).inc_by(energy);
            }
        }

        if let Some(percent) = state.get("total_battery_percent").and_then(FieldValue::as_u16) {
            self.total_battery_percent
                .with_label_values(&labels)
                .set(f64::from(percent));
        }

        if let Some(percent) = state.get("pack_battery_percent").and_then(FieldValue::as_u16) {
            let pack_num = state
                .get("pack_num")
                .and_then(FieldValue::as_u16)
                .unwrap_or(1)
                .to_string();
            self.pack_battery_percent
                .with_label_values(&[device_type, serial, pack_num.as_str()])
                .set(f64::from(percent));
        }

        if let Some(packs) = state.get("packs").and_then(FieldValue::as_packs) {
            for pack in packs {
                let pack_num = pack.pack_num.to_string();
                for (index, voltage) in pack.voltages.iter().enumerate() {
                    let cell_num = (index + 1).to_string();
                    self.cell_voltage
                        .with_label_values(&[device_type, serial, pack_num.as_str(), cell_num.as_str()])
                        .set(*voltage);
                }
            }
        }
    }

    /// 梯形积分：返回本次新增的瓦时数，首个采样返回 0。
    fn integrate(&self, serial: &str, field: &'static str, watts: f64, now: Instant) -> f64 {
        let mut samples = match self.last_samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = samples.insert((serial.to_string(), field), (now, watts));
        match previous {
            Some((at, previous_watts)) => {
                let hours = now.saturating_duration_since(at).as_secs_f64() / 3600.0;
                (previous_watts + watts) / 2.0 * hours
            }
            None => 0.0,
        }
    }

    /// Prometheus 文本格式
    pub fn render(&self) -> Result<String, ExporterError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[async_trait]
impl EventSubscriber for Exporter {
    fn name(&self) -> &str {
        "prometheus_exporter"
    }

    async fn handle_event(&self, event: &DeviceEvent) -> Result<(), SubscriberError> {
        self.record(event);
        debug!(target: "ps.exporter", serial = %event.client_id, fields = event.state.fields.len(), "event_recorded");
        Ok(())
    }
}

fn register_gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, ExporterError> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DeviceState, PackInfo, ParsedFields};
    use std::time::Duration;

    fn event(fields: &[(&'static str, FieldValue)]) -> DeviceEvent {
        let fields: ParsedFields = fields.iter().cloned().collect();
        DeviceEvent {
            client_id: "SN1".to_string(),
            state: DeviceState::new("AC300", fields),
        }
    }

    #[test]
    fn test_power_gauges_and_trapezoid_energy() {
        let exporter = Exporter::new().unwrap();
        let start = Instant::now();

        exporter.record_at(&event(&[("solar_power", FieldValue::UInt(100))]), start);
        exporter.record_at(
            &event(&[("solar_power", FieldValue::UInt(300))]),
            start + Duration::from_secs(1800),
        );

        let labels = ["AC300", "SN1"];
        let solar = &exporter.power[0];
        assert_eq!(solar.watts.with_label_values(&labels).get(), 300.0);
        // (100 + 300) / 2 × 0.5h
        assert!((solar.watt_hours.with_label_values(&labels).get() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_tracked_per_device_and_field() {
        let exporter = Exporter::new().unwrap();
        let start = Instant::now();
        let later = start + Duration::from_secs(3600);

        exporter.record_at(&event(&[("grid_power", FieldValue::UInt(50))]), start);
        // 另一个字段的首个采样不产生电量
        exporter.record_at(&event(&[("ac_output_power", FieldValue::UInt(80))]), later);
        exporter.record_at(&event(&[("grid_power", FieldValue::UInt(50))]), later);

        let labels = ["AC300", "SN1"];
        assert!((exporter.power[1].watt_hours.with_label_values(&labels).get() - 50.0).abs() < 1e-9);
        assert_eq!(exporter.power[2].watt_hours.with_label_values(&labels).get(), 0.0);
    }

    #[test]
    fn test_battery_and_cell_metrics() {
        let exporter = Exporter::new().unwrap();
        exporter.record(&event(&[
            ("total_battery_percent", FieldValue::UInt(76)),
            ("pack_battery_percent", FieldValue::UInt(81)),
            ("pack_num", FieldValue::UInt(2)),
            (
                "packs",
                FieldValue::Packs(vec![PackInfo {
                    pack_num: 2,
                    voltages: vec![3.31, 3.32],
                }]),
            ),
        ]));

        assert_eq!(
            exporter
                .total_battery_percent
                .with_label_values(&["AC300", "SN1"])
                .get(),
            76.0
        );
        assert_eq!(
            exporter
                .pack_battery_percent
                .with_label_values(&["AC300", "SN1", "2"])
                .get(),
            81.0
        );
        assert_eq!(
            exporter
                .cell_voltage
                .with_label_values(&["AC300", "SN1", "2", "2"])
                .get(),
            3.32
        );
    }

    #[test]
    fn test_render_contains_series() {
        let exporter = Exporter::new().unwrap();
        exporter.record(&event(&[("dc_output_power", FieldValue::UInt(12))]));
        let text = exporter.render().unwrap();
        assert!(text.contains("# TYPE dc_output_power_watts gauge"));
        assert!(text.contains("dc_output_power_watts{device_type=\"AC300\",serial_number=\"SN1\"} 12"));
    }
}
