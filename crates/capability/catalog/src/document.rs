//! 寄存器配置文档（YAML / JSON）
//!
//! ```yaml
//! registers:
//!   min_soc:
//!     address: 13058
//!     function_code: 6
//!     data_type: uint16
//!     scale: 0.1
//!     unit: "%"
//!     writable: true
//!     safe_range: { min: 0, max: 100 }
//!     not_above: max_soc
//! legacy_registers:
//!   active_power:
//!     address: 5008
//!     data_type: int32
//!     swap: word
//! ```
//!
//! 32 位寄存器的 `swap`：省略或 `none` 时线上顺序为 `[low, high]`，`word` / `swapped`
//! 时为 `[high, low]`。旧版采集脚本中 `swap: word` 的含义与此相反，迁移旧配置时
//! 需要对调。

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 配置文档：主寄存器表 + 兼容旧版的只读寄存器表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub registers: BTreeMap<String, RegisterSpec>,
    #[serde(default)]
    pub legacy_registers: BTreeMap<String, RegisterSpec>,
}

/// 安全范围（工程单位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeRangeSpec {
    pub min: f64,
    pub max: f64,
}

/// 文档中的单个寄存器条目（未校验）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// 文档中由 map key 填充
    #[serde(default)]
    pub name: String,
    pub address: i64,
    /// 3 = 读保持，4 = 读输入，6 = 写单个
    #[serde(default = "default_function_code")]
    pub function_code: u8,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub count: Option<u16>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default, alias = "endianness")]
    pub endian: Option<String>,
    #[serde(default)]
    pub swap: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub safe_range: Option<SafeRangeSpec>,
    #[serde(default)]
    pub legal_values: Option<Vec<i64>>,
    #[serde(default)]
    pub not_above: Option<String>,
    #[serde(default)]
    pub not_below: Option<String>,
    /// 来自 `legacy_registers`
    #[serde(skip)]
    pub legacy: bool,
}

fn default_function_code() -> u8 {
    4
}

fn default_data_type() -> String {
    "uint16".to_string()
}

fn default_scale() -> f64 {
    1.0
}

impl RegisterSpec {
    /// 以默认字段构造条目（读输入寄存器、uint16、scale 1）
    pub fn new(name: impl Into<String>, address: i64) -> Self {
        Self {
            name: name.into(),
            address,
            function_code: default_function_code(),
            data_type: default_data_type(),
            count: None,
            scale: default_scale(),
            endian: None,
            swap: None,
            unit: String::new(),
            writable: false,
            description: String::new(),
            safe_range: None,
            legal_values: None,
            not_above: None,
            not_below: None,
            legacy: false,
        }
    }
}

impl CatalogDocument {
    /// 从 YAML 字符串解析
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::Document(e.to_string()))
    }

    /// 从 JSON 字符串解析
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json).map_err(|e| CatalogError::Document(e.to_string()))
    }

    /// 展开为条目列表：主表在前，旧版表在后，名称取自 map key
    pub fn into_specs(self) -> Vec<RegisterSpec> {
        let primary = self.registers.into_iter().map(|(name, spec)| RegisterSpec {
            name,
            legacy: false,
            ..spec
        });
        let legacy = self
            .legacy_registers
            .into_iter()
            .map(|(name, spec)| RegisterSpec {
                name,
                legacy: true,
                ..spec
            });
        primary.chain(legacy).collect()
    }
}
