//! 在线设备巡检
//!
//! - GET /clients - 已完成握手的设备列表
//! - GET /clients/{serial}/pages/{page} - 页面镜像（hex + 解码字段）

use crate::AppState;
use crate::utils::parse_page;
use crate::utils::response::{bad_request_error, client_to_dto, fields_to_json, protocol_error};
use api_contract::{ApiResponse, PageDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ps_protocol::page_name;

#[derive(serde::Deserialize)]
pub struct PagePath {
    serial: String,
    page: String,
}

pub async fn list_clients(State(state): State<AppState>) -> Response {
    let mut items = Vec::new();
    for client in state.server.identified_clients().await {
        if let Some(dto) = client_to_dto(&client).await {
            items.push(dto);
        }
    }
    (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
}

/// 读取页面镜像
///
/// 设备不在线返回 404；页面参数无法解析或不是已知页面返回 400。
pub async fn get_page(State(state): State<AppState>, Path(path): Path<PagePath>) -> Response {
    let Some(page) = parse_page(&path.page) else {
        return bad_request_error(format!("invalid page: {}", path.page));
    };
    let client = match state.server.find_client(&path.serial).await {
        Ok(client) => client,
        Err(err) => return protocol_error(err),
    };
    let data = match client.snapshot_page(page).await {
        Ok(data) => data,
        Err(err) => return protocol_error(err),
    };

    let fields = ps_protocol::decode(page, 0, &data);
    let dto = PageDto {
        serial_number: path.serial,
        page,
        page_name: page_name(page).map(str::to_string),
        data: hex::encode(&data),
        fields: fields_to_json(&fields),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
