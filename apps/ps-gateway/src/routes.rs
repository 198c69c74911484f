//! 路由定义
//!
//! - 健康检查：/health
//! - 设备巡检：/clients, /clients/{serial}/pages/{page}
//! - 命令下发：/clients/{serial}/queries, /fields, /ranges
//! - 观测：/metrics, /stats

use super::AppState;
use super::handlers::*;
use super::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 创建巡检 API 路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/clients", get(list_clients))
        .route("/clients/:serial/pages/:page", get(get_page))
        .route("/clients/:serial/queries", post(send_range_query))
        .route("/clients/:serial/fields", post(send_field_update))
        .route("/clients/:serial/ranges", post(send_range_update))
        .route("/metrics", get(get_metrics))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // 注入 request_id/trace_id
                .layer(middleware::from_fn(request_context)),
        )
}
