//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, protocol_error, internal_error
//! - DTO 转换：client_to_dto, field_value_to_json, fields_to_json

use api_contract::{ApiResponse, ClientDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{FieldValue, ParsedFields};
use ps_broker::Client;
use ps_protocol::ProtocolError;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 内部错误响应
pub fn internal_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message.into())),
    )
        .into_response()
}

/// 协议错误映射为 HTTP 响应
pub fn protocol_error(err: ProtocolError) -> Response {
    let message = err.to_string();
    match err {
        ProtocolError::NotConnected(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("DEVICE.NOT_CONNECTED", message)),
        )
            .into_response(),
        ProtocolError::InvalidPayload(_) | ProtocolError::UnknownPage(_) => {
            bad_request_error(message)
        }
        _ => internal_error(message),
    }
}

/// Client 转 ClientDto（未完成握手返回 None）
pub async fn client_to_dto(client: &Client) -> Option<ClientDto> {
    let identity = client.identity()?;
    Some(ClientDto {
        serial_number: identity.serial_number.clone(),
        device_type: identity.device_type.clone(),
        iot_id: client.iot_id().map(hex::encode),
        peer_addr: client.peer_addr().to_string(),
        idle_ms: client.idle_for().as_millis() as u64,
        outstanding_queries: client.outstanding_queries().await,
    })
}

/// FieldValue 转 JSON
pub fn field_value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::UInt(value) => json!(value),
        FieldValue::Bool(value) => json!(value),
        FieldValue::Str(value) => json!(value),
        FieldValue::Enum(label) => json!(label),
        FieldValue::Packs(packs) => Value::Array(
            packs
                .iter()
                .map(|pack| json!({ "packNum": pack.pack_num, "voltages": pack.voltages }))
                .collect(),
        ),
    }
}

/// ParsedFields 转 JSON 对象
pub fn fields_to_json(fields: &ParsedFields) -> BTreeMap<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), field_value_to_json(value)))
        .collect()
}
