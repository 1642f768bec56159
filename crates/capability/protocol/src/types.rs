//! 传输相关类型定义

use crate::backoff::RetryPolicy;
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Modbus TCP 传输配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Modbus 服务器主机地址
    pub host: String,
    /// Modbus 服务器端口（默认 502）
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 从站 ID
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// 连接超时（毫秒）
    #[serde(default = "default_timeout")]
    pub connect_timeout_ms: u64,
    /// 单次请求超时（毫秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_ms: u64,
    /// 相邻两次请求的最小间隔（毫秒）
    #[serde(default = "default_request_interval")]
    pub min_request_interval_ms: u64,
    /// 读路径重连重试策略
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout() -> u64 {
    10_000
}

fn default_request_interval() -> u64 {
    100
}

impl TransportConfig {
    /// 以默认参数构造
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_modbus_port(),
            unit_id: default_unit_id(),
            connect_timeout_ms: default_timeout(),
            request_timeout_ms: default_timeout(),
            min_request_interval_ms: default_request_interval(),
            retry: RetryPolicy::default(),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        serde_json::from_str(json).map_err(|e| TransportError::ConfigParse(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

/// 会话状态机：`Disconnected → Connecting → Connected → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// 传输统计（只读，用于诊断和测试）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// 读路径上的重连尝试次数
    pub reconnect_attempts: u64,
    /// 每次重连前实际等待的退避延迟
    pub backoff_delays: Vec<Duration>,
    /// 已发出的请求帧数量
    pub requests: u64,
}
