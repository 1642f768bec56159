//! # 寄存器编解码能力模块
//!
//! 原始寄存器字与工程值之间的纯双向转换，无 I/O、无共享状态，可并发调用。
//!
//! ## 解码流程
//!
//! ```text
//! words ──字节序/字序规整──▶ 整数（补码解释） ──× scale──▶ EngineeringValue
//! ```
//!
//! ## 32 位字序
//!
//! | word_swap | 传输顺序        | `[0x0000, 0x0010]` |
//! |-----------|-----------------|--------------------|
//! | none      | `[low, high]`   | 1048576            |
//! | swapped   | `[high, low]`   | 16                 |
//!
//! 字符串寄存器按每字 2 字节展开后去掉尾部 NUL。

mod error;
mod scaling;
mod table;
mod words;

pub use error::CodecError;
pub use scaling::{to_engineering, validate_scale};
pub use table::{conversion, decode_raw, lookup, Conversion, DecodeFn, EncodeFn};

use domain::{EngineeringValue, RegisterDefinition};

/// 寄存器字 → 工程值
pub fn decode(words: &[u16], def: &RegisterDefinition) -> Result<EngineeringValue, CodecError> {
    (conversion(def.data_type).decode)(words, def)
}

/// 工程值 → 寄存器字（`decode` 的逆运算）
pub fn encode(value: f64, def: &RegisterDefinition) -> Result<Vec<u16>, CodecError> {
    (conversion(def.data_type).encode)(value, def)
}

/// 工程值对应的编码后整数（枚举校验用，不拆字）
pub fn encoded_integer(value: f64, def: &RegisterDefinition) -> Result<i64, CodecError> {
    scaling::to_raw(value, def.scale, def.data_type)
}
