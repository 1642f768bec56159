//! 传输错误类型定义

/// 传输层错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// 连接被拒绝、不可达或会话被重置
    #[error("connection error: {0}")]
    Connection(String),

    /// 会话未打开（从未连接或已显式断开）
    #[error("connection error: session not open")]
    NotOpen,

    /// 超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 帧格式错误或设备返回异常码
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

impl TransportError {
    /// 读路径可以透明重连重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
