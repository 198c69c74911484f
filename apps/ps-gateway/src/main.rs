//! 储能电站本地网关
//!
//! 冒充云端 broker 接入设备（握手 + MQTT 子集），解码页面上报并发布到事件总线；
//! 订阅者包括 Prometheus 导出器。可选的 HTTP 巡检接口用于查看在线设备、
//! 页面镜像和下发命令。

mod exporter;
mod handlers;
mod middleware;
mod routes;
mod utils;

use exporter::Exporter;
use ps_broker::{BrokerConfig, Server};
use ps_config::AppConfig;
use ps_events::EventBus;
use ps_telemetry::{GatewayStats, init_tracing};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    server: Arc<Server>,
    stats: Arc<GatewayStats>,
    exporter: Option<Arc<Exporter>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 计数器由入口创建并注入总线、接入服务与 HTTP
    let stats = Arc::new(GatewayStats::new());
    let bus = Arc::new(EventBus::new(stats.clone()));
    bus.start();

    let exporter = if config.metrics_enabled {
        let exporter = Arc::new(Exporter::new()?);
        bus.subscribe(exporter.clone()).await;
        Some(exporter)
    } else {
        None
    };

    let server = Server::bind(BrokerConfig::from(&config), bus.clone(), stats.clone()).await?;
    let state = AppState {
        server: server.clone(),
        stats,
        exporter,
    };

    let shutdown = CancellationToken::new();
    let http = if config.http_enabled {
        let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
        info!(target: "ps.http", addr = %listener.local_addr()?, "http_listening");
        let app = routes::create_router(state);
        let stop = shutdown.clone().cancelled_owned();
        Some(tokio::spawn(async move {
            axum::serve(listener, app).with_graceful_shutdown(stop).await
        }))
    } else {
        None
    };

    shutdown_signal().await;
    info!(target: "ps.gateway", "shutdown_requested");
    shutdown.cancel();

    if let Some(handle) = http {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(target: "ps.http", error = %err, "http_server_failed"),
            Err(err) => warn!(target: "ps.http", error = %err, "http_task_join_failed"),
        }
    }
    server.shutdown().await;
    bus.stop().await;
    info!(target: "ps.gateway", "gateway_stopped");
    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target: "ps.gateway", error = %err, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target: "ps.gateway", error = %err, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
