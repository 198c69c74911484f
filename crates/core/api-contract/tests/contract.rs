use api_contract::{ClientDto, GatewayStatsDto, PageDto, RangeQueryRequest, RangeUpdateRequest};
use serde_json::Value;
use std::collections::BTreeMap;

#[test]
fn client_dto_is_camel_case() {
    let dto = ClientDto {
        serial_number: "2235000001234".to_string(),
        device_type: "AC300".to_string(),
        iot_id: Some("696f74".to_string()),
        peer_addr: "10.0.0.8:50122".to_string(),
        idle_ms: 120,
        outstanding_queries: 1,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["serialNumber"], "2235000001234");
    assert_eq!(value["deviceType"], "AC300");
    assert_eq!(value["idleMs"], 120);
    assert!(value.get("serial_number").is_none());
}

#[test]
fn page_dto_carries_decoded_fields() {
    let mut fields = BTreeMap::new();
    fields.insert("solar_power".to_string(), Value::from(420));
    let dto = PageDto {
        serial_number: "SN".to_string(),
        page: 0,
        page_name: Some("status".to_string()),
        data: "00".repeat(512),
        fields,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["pageName"], "status");
    assert_eq!(value["fields"]["solar_power"], 420);
}

#[test]
fn command_requests_parse() {
    let query: RangeQueryRequest =
        serde_json::from_str(r#"{"page":0,"offset":70,"words":127}"#).expect("parse");
    assert_eq!((query.page, query.offset, query.words), (0, 70, 127));

    let update: RangeUpdateRequest =
        serde_json::from_str(r#"{"page":11,"offset":199,"data":"0014005a"}"#).expect("parse");
    assert_eq!(update.data, "0014005a");

    let out_of_range = serde_json::from_str::<RangeQueryRequest>(r#"{"page":300,"offset":0,"words":1}"#);
    assert!(out_of_range.is_err());
}

#[test]
fn stats_dto_is_camel_case() {
    let value = serde_json::to_value(GatewayStatsDto::default()).expect("serialize");
    assert_eq!(value["activeConnections"], 0);
    assert!(value.get("commandsSent").is_some());
}
