//! 数据类型标签 → 编解码函数对的查找表。
//!
//! 目录加载时通过 [`lookup`] 解析 `data_type` 字符串，未知标签在加载期就被拒绝，
//! 运行期只按 [`DataType`] 取表项，不再做字符串分派。

use crate::error::CodecError;
use crate::scaling::{to_engineering, to_raw, validate_scale};
use crate::words;
use domain::{DataType, EngineeringValue, RegisterDefinition};

pub type DecodeFn = fn(&[u16], &RegisterDefinition) -> Result<EngineeringValue, CodecError>;
pub type EncodeFn = fn(f64, &RegisterDefinition) -> Result<Vec<u16>, CodecError>;

/// 单个数据类型的纯转换函数对
#[derive(Debug)]
pub struct Conversion {
    pub data_type: DataType,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
}

static CONVERSIONS: [Conversion; 5] = [
    Conversion {
        data_type: DataType::Uint16,
        decode: decode_numeric,
        encode: encode_16,
    },
    Conversion {
        data_type: DataType::Int16,
        decode: decode_numeric,
        encode: encode_16,
    },
    Conversion {
        data_type: DataType::Uint32,
        decode: decode_numeric,
        encode: encode_32,
    },
    Conversion {
        data_type: DataType::Int32,
        decode: decode_numeric,
        encode: encode_32,
    },
    Conversion {
        data_type: DataType::FixedString,
        decode: decode_text,
        encode: encode_text,
    },
];

const TAGS: &[(&str, DataType)] = &[
    ("uint16", DataType::Uint16),
    ("int16", DataType::Int16),
    ("uint32", DataType::Uint32),
    ("int32", DataType::Int32),
    ("string", DataType::FixedString),
    ("fixed_string", DataType::FixedString),
];

/// 按配置标签查找（大小写不敏感）
pub fn lookup(tag: &str) -> Option<&'static Conversion> {
    let tag = tag.trim().to_ascii_lowercase();
    TAGS.iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, data_type)| conversion(*data_type))
}

/// 按已解析的数据类型取表项
pub fn conversion(data_type: DataType) -> &'static Conversion {
    match data_type {
        DataType::Uint16 => &CONVERSIONS[0],
        DataType::Int16 => &CONVERSIONS[1],
        DataType::Uint32 => &CONVERSIONS[2],
        DataType::Int32 => &CONVERSIONS[3],
        DataType::FixedString => &CONVERSIONS[4],
    }
}

/// 寄存器字 → 原始整数（已做补码解释）
pub fn decode_raw(words: &[u16], def: &RegisterDefinition) -> Result<i64, CodecError> {
    words::ensure_word_count(words, def)?;
    let raw = match def.data_type {
        DataType::Uint16 => words::read_u16(words, def) as i64,
        DataType::Int16 => words::read_u16(words, def) as i16 as i64,
        DataType::Uint32 => words::read_u32(words, def) as i64,
        DataType::Int32 => words::read_u32(words, def) as i32 as i64,
        DataType::FixedString => return Err(CodecError::NotNumeric(def.data_type.tag())),
    };
    Ok(raw)
}

fn decode_numeric(words: &[u16], def: &RegisterDefinition) -> Result<EngineeringValue, CodecError> {
    validate_scale(def.scale)?;
    let raw = decode_raw(words, def)?;
    Ok(to_engineering(raw, def.scale))
}

fn decode_text(words: &[u16], def: &RegisterDefinition) -> Result<EngineeringValue, CodecError> {
    words::ensure_word_count(words, def)?;
    Ok(EngineeringValue::Text(words::read_text(words, def)))
}

fn encode_16(value: f64, def: &RegisterDefinition) -> Result<Vec<u16>, CodecError> {
    let raw = to_raw(value, def.scale, def.data_type)?;
    // 负数截断即得到补码
    Ok(words::write_u16(raw as u16, def))
}

fn encode_32(value: f64, def: &RegisterDefinition) -> Result<Vec<u16>, CodecError> {
    let raw = to_raw(value, def.scale, def.data_type)?;
    Ok(words::write_u32(raw as u32, def))
}

fn encode_text(_value: f64, def: &RegisterDefinition) -> Result<Vec<u16>, CodecError> {
    Err(CodecError::NotNumeric(def.data_type.tag()))
}
