//! # 寄存器目录能力模块
//!
//! 把配置文档（YAML / JSON）解析为不可变的寄存器目录，加载期完成全部校验：
//!
//! - 名称唯一（主表与旧版表共享命名空间）
//! - `data_type` / `function_code` / `endian` / `swap` 标签合法
//! - 字数、地址跨度、scale 合法
//! - 写入规则只出现在可写的 16 位保持寄存器上
//! - 跨字段规则的伙伴寄存器存在且可写
//!
//! 任何一项失败都返回 [`CatalogError::Config`]，进程不应带着非法目录启动。

mod catalog;
mod document;
mod error;

pub use catalog::{Catalog, CatalogEntry};
pub use document::{CatalogDocument, RegisterSpec, SafeRangeSpec};
pub use error::CatalogError;
