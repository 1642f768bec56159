//! # 控制会话能力模块
//!
//! 编排寄存器读取，以及写入的 校验 → 编码 → 写入 → 回读确认 流程：
//!
//! ```text
//! write_by_name(name, value)
//!       │
//!       ├─ SafetyValidator 拒绝 ──▶ Rejected(reason)，不做任何 I/O
//!       ├─ Codec 编码失败 ────────▶ Rejected(EncodeFailure)
//!       ├─ Transport 写失败 ──────▶ TransportFailure（不重试）
//!       └─ 回读解码
//!             ├─ 容差内 ──────────▶ Success
//!             └─ 不一致 ──────────▶ VerificationMismatch
//! ```
//!
//! 会话持有进程内快照：每次成功读取（包括写后回读）都会更新对应条目。

mod commands;
mod error;
mod session;

pub use commands::{
    BACKUP_MODE, BACKUP_RESERVE_SOC, BATTERY_FORCED_CMD, BATTERY_FORCED_POWER, BatteryCommand,
    EMS_MODE_SELECTION, EXPORT_POWER_LIMIT, EXPORT_POWER_LIMIT_MODE, EmsMode, MAX_SOC, MIN_SOC,
    SYSTEM_STATE,
};
pub use error::ControlError;
pub use session::ControlSession;
