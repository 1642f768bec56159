//! 逆变器采集代理：加载寄存器目录，连接设备，按固定间隔刷新快照。

use invlink_catalog::Catalog;
use invlink_config::AppConfig;
use invlink_control::ControlSession;
use invlink_protocol::{
    ModbusTransport, RegisterTransport, RetryPolicy, TokioModbusConnector, TransportConfig,
};
use invlink_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 寄存器目录：非法条目在这里直接失败退出
    let document = tokio::fs::read_to_string(&config.register_catalog_path).await?;
    let catalog = Arc::new(Catalog::from_yaml_str(&document)?);
    let readable = catalog.names();

    let transport = ModbusTransport::new(TokioModbusConnector, transport_config(&config));
    let session = ControlSession::new(catalog, transport);
    session
        .connect(
            &config.modbus_host,
            config.modbus_port,
            Duration::from_millis(config.connect_timeout_ms),
        )
        .await?;

    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => poll_once(&session, &readable).await,
            _ = tokio::signal::ctrl_c() => {
                info!(target: "invlink.agent", "shutdown_requested");
                break;
            }
        }
    }

    session.disconnect().await;
    Ok(())
}

fn transport_config(config: &AppConfig) -> TransportConfig {
    TransportConfig {
        host: config.modbus_host.clone(),
        port: config.modbus_port,
        unit_id: config.modbus_unit_id,
        connect_timeout_ms: config.connect_timeout_ms,
        request_timeout_ms: config.request_timeout_ms,
        min_request_interval_ms: config.request_interval_ms,
        retry: RetryPolicy {
            max_attempts: config.read_retry_max_attempts,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            jitter_ms: config.retry_jitter_ms,
        },
    }
}

/// 读取全部寄存器并输出快照
async fn poll_once<T: RegisterTransport>(session: &ControlSession<T>, names: &[String]) {
    let results = session.read_many(names).await;
    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    if failed > 0 {
        warn!(
            target: "invlink.agent",
            failed,
            total = results.len(),
            "snapshot_refresh_partial"
        );
    }

    let snapshot = session.snapshot().await;
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!(
            target: "invlink.agent",
            registers = snapshot.len(),
            snapshot = %json,
            "snapshot_refreshed"
        ),
        Err(err) => warn!(target: "invlink.agent", error = %err, "snapshot_serialize_failed"),
    }

    let counters = metrics().snapshot();
    info!(
        target: "invlink.agent",
        reads_ok = counters.reads_ok,
        read_failures = counters.read_failures,
        reconnects = counters.reconnects,
        "poll_metrics"
    );
}
