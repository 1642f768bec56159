//! 逆变器寄存器领域模型：所有能力模块共享的数据结构。

pub mod control;
pub mod data;
pub mod register;
pub mod state;

pub use control::{ControlOutcome, ControlRequest, ControlResult, RejectReason};
pub use data::{EngineeringValue, Snapshot, SnapshotEntry};
pub use register::{
    CrossFieldRule, DataType, Endianness, FunctionCode, ReadFunction, RegisterDefinition,
    SafeRange, WordSwap, WriteRules,
};
pub use state::SystemState;

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
