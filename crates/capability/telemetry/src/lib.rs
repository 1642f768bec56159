//! 追踪、请求 ID 与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads_ok: u64,
    pub read_failures: u64,
    pub writes_success: u64,
    pub writes_rejected: u64,
    pub writes_mismatch: u64,
    pub writes_transport_failure: u64,
    pub reconnects: u64,
    pub write_latency_ms_total: u64,
    pub write_latency_ms_count: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    reads_ok: AtomicU64,
    read_failures: AtomicU64,
    writes_success: AtomicU64,
    writes_rejected: AtomicU64,
    writes_mismatch: AtomicU64,
    writes_transport_failure: AtomicU64,
    reconnects: AtomicU64,
    write_latency_ms_total: AtomicU64,
    write_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            reads_ok: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            writes_success: AtomicU64::new(0),
            writes_rejected: AtomicU64::new(0),
            writes_mismatch: AtomicU64::new(0),
            writes_transport_failure: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            write_latency_ms_total: AtomicU64::new(0),
            write_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            writes_success: self.writes_success.load(Ordering::Relaxed),
            writes_rejected: self.writes_rejected.load(Ordering::Relaxed),
            writes_mismatch: self.writes_mismatch.load(Ordering::Relaxed),
            writes_transport_failure: self.writes_transport_failure.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            write_latency_ms_total: self.write_latency_ms_total.load(Ordering::Relaxed),
            write_latency_ms_count: self.write_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id。
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录寄存器读取成功。
pub fn record_read_ok() {
    metrics().reads_ok.fetch_add(1, Ordering::Relaxed);
}

/// 记录寄存器读取失败（传输或解码）。
pub fn record_read_failure() {
    metrics().read_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_write_success() {
    metrics().writes_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录被安全校验或编码拒绝的写入。
pub fn record_write_rejected() {
    metrics().writes_rejected.fetch_add(1, Ordering::Relaxed);
}

pub fn record_write_mismatch() {
    metrics().writes_mismatch.fetch_add(1, Ordering::Relaxed);
}

pub fn record_write_transport_failure() {
    metrics().writes_transport_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录读路径重连。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入（含回读确认）耗时。
pub fn record_write_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .write_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics.write_latency_ms_count.fetch_add(1, Ordering::Relaxed);
}
