//! 目录错误类型定义

/// 寄存器目录错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// 目录条目非法（加载期致命）
    #[error("register {register}: {reason}")]
    Config { register: String, reason: String },

    /// 按名称查找失败
    #[error("register not found: {0}")]
    NotFound(String),

    /// 配置文档无法解析
    #[error("catalog document error: {0}")]
    Document(String),
}

impl CatalogError {
    pub(crate) fn config(register: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            register: register.to_string(),
            reason: reason.into(),
        }
    }
}
