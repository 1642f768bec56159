//! 控制请求与结果。

use crate::data::EngineeringValue;
use serde::Serialize;
use std::fmt;

/// 一次写入尝试（每次写入一个，用后即弃）。
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    pub request_id: String,
    pub register_name: String,
    /// 期望写入的工程值
    pub desired_value: f64,
    pub issued_at_ms: i64,
}

impl ControlRequest {
    pub fn new(
        request_id: impl Into<String>,
        register_name: impl Into<String>,
        desired_value: f64,
        issued_at_ms: i64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            register_name: register_name.into(),
            desired_value,
            issued_at_ms,
        }
    }
}

/// 安全校验拒绝原因。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// 寄存器不存在或不可写
    NotWritable,
    /// 超出声明的安全范围
    OutOfRange { value: f64, min: f64, max: f64 },
    /// 编码后的整数不在允许集合中
    IllegalValue { raw: Option<i64> },
    /// 违反与伙伴寄存器的跨字段约束
    CrossFieldViolation {
        partner: String,
        partner_value: Option<f64>,
    },
    /// 缩放/位宽不允许编码该值
    EncodeFailure { detail: String },
    /// 批量写入中其它请求失败，本请求未执行
    BatchAborted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWritable => f.write_str("register is not writable"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {} outside safe range [{}, {}]", value, min, max)
            }
            Self::IllegalValue { raw: Some(raw) } => {
                write!(f, "encoded value {} is not a legal value", raw)
            }
            Self::IllegalValue { raw: None } => f.write_str("value cannot be encoded as a legal value"),
            Self::CrossFieldViolation {
                partner,
                partner_value,
            } => match partner_value {
                Some(value) => write!(f, "violates limit against {} = {}", partner, value),
                None => write!(f, "limit partner {} has no known value", partner),
            },
            Self::EncodeFailure { detail } => write!(f, "encode failure: {}", detail),
            Self::BatchAborted => f.write_str("batch aborted before this request"),
        }
    }
}

/// 写入结果分类。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Success,
    Rejected(RejectReason),
    /// 传输层已确认写入，但回读值与期望不符
    VerificationMismatch,
    TransportFailure { detail: String },
}

impl ControlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected(_) => "rejected",
            Self::VerificationMismatch => "verification_mismatch",
            Self::TransportFailure { .. } => "transport_failure",
        }
    }
}

/// 一次写入尝试的完整结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlResult {
    pub request_id: String,
    pub register_name: String,
    pub outcome: ControlOutcome,
    pub applied_raw_value: Option<u16>,
    pub readback_value: Option<EngineeringValue>,
}

impl ControlResult {
    pub fn rejected(request: &ControlRequest, reason: RejectReason) -> Self {
        Self {
            request_id: request.request_id.clone(),
            register_name: request.register_name.clone(),
            outcome: ControlOutcome::Rejected(reason),
            applied_raw_value: None,
            readback_value: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
