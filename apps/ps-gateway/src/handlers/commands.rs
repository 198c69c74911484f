//! 命令下发
//!
//! - POST /clients/{serial}/queries - 范围查询
//! - POST /clients/{serial}/fields - 单字段写入
//! - POST /clients/{serial}/ranges - 范围写入（data 为 hex）

use crate::AppState;
use crate::utils::response::{bad_request_error, protocol_error};
use api_contract::{
    ApiResponse, CommandDto, FieldUpdateRequest, RangeQueryRequest, RangeUpdateRequest,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ps_protocol::{Command, FieldUpdate, RangeQuery, RangeUpdate};
use tracing::info;

pub async fn send_range_query(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Json(req): Json<RangeQueryRequest>,
) -> Response {
    let command = Command::from(RangeQuery {
        page: req.page,
        offset: req.offset,
        words: req.words,
    });
    dispatch(&state, serial, "range_query", command).await
}

pub async fn send_field_update(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Json(req): Json<FieldUpdateRequest>,
) -> Response {
    let command = Command::from(FieldUpdate {
        page: req.page,
        offset: req.offset,
        value: req.value,
    });
    dispatch(&state, serial, "field_update", command).await
}

pub async fn send_range_update(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Json(req): Json<RangeUpdateRequest>,
) -> Response {
    let data = match hex::decode(req.data.trim()) {
        Ok(data) => data,
        Err(err) => return bad_request_error(format!("invalid hex data: {err}")),
    };
    let update = match RangeUpdate::new(req.page, req.offset, data) {
        Ok(update) => update,
        Err(err) => return protocol_error(err),
    };
    dispatch(&state, serial, "range_update", Command::from(update)).await
}

async fn dispatch(
    state: &AppState,
    serial: String,
    name: &'static str,
    command: Command,
) -> Response {
    let encoded = hex::encode(command.encode());
    if let Err(err) = state.server.send_command(&serial, command).await {
        return protocol_error(err);
    }
    info!(target: "ps.http", serial = %serial, command = name, encoded = %encoded, "command_dispatched");
    let dto = CommandDto {
        serial_number: serial,
        command: name.to_string(),
        encoded,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
