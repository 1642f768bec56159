//! 原始整数与工程值之间的缩放。

use crate::error::CodecError;
use domain::{DataType, EngineeringValue};

/// 缩放系数必须非零且有限
pub fn validate_scale(scale: f64) -> Result<(), CodecError> {
    if scale == 0.0 || !scale.is_finite() {
        return Err(CodecError::Scale(scale));
    }
    Ok(())
}

/// 若 `1 / scale` 为整数（0.1、0.01 等），返回该除数。
///
/// 用除法代替乘以 0.1 可以得到 `54.2` 而不是 `54.2000000001`。
fn integral_divisor(scale: f64) -> Option<f64> {
    let inverse = 1.0 / scale;
    let rounded = inverse.round();
    if rounded != 0.0 && (inverse - rounded).abs() < 1e-9 {
        Some(rounded)
    } else {
        None
    }
}

/// 原始整数 × scale → 工程值
pub fn to_engineering(raw: i64, scale: f64) -> EngineeringValue {
    if scale.fract() == 0.0 && scale.abs() <= (1u64 << 53) as f64 {
        if let Some(value) = raw.checked_mul(scale as i64) {
            return EngineeringValue::Integer(value);
        }
    }
    match integral_divisor(scale) {
        Some(divisor) => EngineeringValue::Float(raw as f64 / divisor),
        None => EngineeringValue::Float(raw as f64 * scale),
    }
}

/// 工程值 ÷ scale，四舍五入到最近整数，并做位宽检查
pub fn to_raw(value: f64, scale: f64, data_type: DataType) -> Result<i64, CodecError> {
    validate_scale(scale)?;
    let (min, max) = data_type
        .raw_bounds()
        .ok_or(CodecError::NotNumeric(data_type.tag()))?;
    if !value.is_finite() {
        return Err(CodecError::Range {
            value,
            data_type: data_type.tag(),
        });
    }
    let scaled = match integral_divisor(scale) {
        Some(divisor) => value * divisor,
        None => value / scale,
    };
    let rounded = scaled.round();
    if rounded < min as f64 || rounded > max as f64 {
        return Err(CodecError::Range {
            value,
            data_type: data_type.tag(),
        });
    }
    Ok(rounded as i64)
}
