//! 编解码错误类型定义

/// 编解码错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// 缩放后的整数超出声明位宽
    #[error("value {value} does not fit {data_type}")]
    Range { value: f64, data_type: &'static str },

    /// 缩放系数为 0 或非有限数
    #[error("invalid scale factor: {0}")]
    Scale(f64),

    /// 寄存器字数与定义不符
    #[error("expected {expected} words, got {actual}")]
    WordCount { expected: u16, actual: usize },

    /// 对字符串寄存器做数值编码
    #[error("{0} registers carry no numeric value")]
    NotNumeric(&'static str),
}
