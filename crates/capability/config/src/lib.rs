//! 应用运行配置加载。

use std::env;
use std::str::FromStr;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub modbus_host: String,
    pub modbus_port: u16,
    pub modbus_unit_id: u8,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub request_interval_ms: u64,
    pub read_retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub register_catalog_path: String,
    pub poll_interval_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let modbus_host = read_optional("INVLINK_MODBUS_HOST")
            .ok_or_else(|| ConfigError::Missing("INVLINK_MODBUS_HOST".to_string()))?;
        let modbus_port = read_with_default("INVLINK_MODBUS_PORT", 502)?;
        let modbus_unit_id = read_with_default("INVLINK_MODBUS_UNIT_ID", 1)?;
        let connect_timeout_ms = read_with_default("INVLINK_CONNECT_TIMEOUT_MS", 10_000)?;
        let request_timeout_ms = read_with_default("INVLINK_REQUEST_TIMEOUT_MS", 10_000)?;
        let request_interval_ms = read_with_default("INVLINK_REQUEST_INTERVAL_MS", 100)?;
        let read_retry_max_attempts = read_with_default("INVLINK_READ_RETRY_MAX_ATTEMPTS", 3)?;
        let retry_base_delay_ms = read_with_default("INVLINK_RETRY_BASE_DELAY_MS", 500)?;
        let retry_max_delay_ms = read_with_default("INVLINK_RETRY_MAX_DELAY_MS", 30_000)?;
        let retry_jitter_ms = read_with_default("INVLINK_RETRY_JITTER_MS", 250)?;
        let register_catalog_path = read_optional("INVLINK_REGISTER_CATALOG")
            .unwrap_or_else(|| "config/registers.yaml".to_string());
        let poll_interval_ms = read_with_default("INVLINK_POLL_INTERVAL_MS", 10_000)?;

        if retry_base_delay_ms > retry_max_delay_ms {
            return Err(ConfigError::Invalid(
                "INVLINK_RETRY_BASE_DELAY_MS".to_string(),
                format!("{} exceeds max delay {}", retry_base_delay_ms, retry_max_delay_ms),
            ));
        }
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "INVLINK_POLL_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            modbus_host,
            modbus_port,
            modbus_unit_id,
            connect_timeout_ms,
            request_timeout_ms,
            request_interval_ms,
            read_retry_max_attempts,
            retry_base_delay_ms,
            retry_max_delay_ms,
            retry_jitter_ms,
            register_catalog_path,
            poll_interval_ms,
        })
    }
}

/// 读取带默认值的数值型环境变量（空字符串视为未设置）。
fn read_with_default<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match read_optional(key) {
        Some(value) => value,
        None => return Ok(default),
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
