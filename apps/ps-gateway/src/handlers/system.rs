//! 系统接口
//!
//! - GET /health
//! - GET /stats - 网关计数器
//! - GET /metrics - Prometheus 文本

use crate::AppState;
use crate::utils::response::{internal_error, not_found_error};
use api_contract::{ApiResponse, GatewayStatsDto, HealthDto};
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

pub async fn health(State(state): State<AppState>) -> Response {
    let dto = HealthDto {
        status: "ok".to_string(),
        broker_addr: state.server.local_addr().to_string(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

pub async fn get_stats(State(state): State<AppState>) -> Response {
    let snapshot = state.stats.snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(GatewayStatsDto {
            active_connections: snapshot.active_connections(),
            connections_accepted: snapshot.connections_accepted,
            connections_closed: snapshot.connections_closed,
            handshakes_completed: snapshot.handshakes_completed,
            frames_decoded: snapshot.frames_decoded,
            framing_errors: snapshot.framing_errors,
            protocol_errors: snapshot.protocol_errors,
            publishes_decoded: snapshot.publishes_decoded,
            payloads_dropped: snapshot.payloads_dropped,
            events_published: snapshot.events_published,
            subscriber_failures: snapshot.subscriber_failures,
            commands_sent: snapshot.commands_sent,
            command_failures: snapshot.command_failures,
        })),
    )
        .into_response()
}

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let Some(exporter) = state.exporter.as_ref() else {
        return not_found_error("metrics exporter disabled");
    };
    match exporter.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => internal_error(err.to_string()),
    }
}
