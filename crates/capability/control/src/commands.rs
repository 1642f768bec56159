//! 常用控制命令。
//!
//! 全部经由 `write_by_name` / `write_batch`，因此都会经过安全校验。

use crate::error::ControlError;
use crate::session::ControlSession;
use domain::{ControlRequest, ControlResult, SystemState, now_epoch_ms};
use invlink_protocol::RegisterTransport;
use invlink_telemetry::new_request_id;

pub const EMS_MODE_SELECTION: &str = "ems_mode_selection";
pub const BATTERY_FORCED_CMD: &str = "battery_forced_charge_discharge_cmd";
pub const BATTERY_FORCED_POWER: &str = "battery_forced_charge_discharge_power";
pub const MIN_SOC: &str = "min_soc";
pub const MAX_SOC: &str = "max_soc";
pub const EXPORT_POWER_LIMIT: &str = "export_power_limit";
pub const EXPORT_POWER_LIMIT_MODE: &str = "export_power_limit_mode";
pub const BACKUP_MODE: &str = "backup_mode";
pub const BACKUP_RESERVE_SOC: &str = "reserved_soc_for_backup";
pub const SYSTEM_STATE: &str = "system_state";

/// 开关型寄存器的取值
const ENABLE: f64 = 0xAA as f64;
const DISABLE: f64 = 0x55 as f64;

/// EMS 工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmsMode {
    SelfConsumption,
    Forced,
    ExternalEms,
}

impl EmsMode {
    pub fn code(self) -> u16 {
        match self {
            Self::SelfConsumption => 0,
            Self::Forced => 2,
            Self::ExternalEms => 3,
        }
    }
}

/// 电池强制充放电命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryCommand {
    Charge,
    Discharge,
    Stop,
}

impl BatteryCommand {
    pub fn code(self) -> u16 {
        match self {
            Self::Charge => 0xAA,
            Self::Discharge => 0xBB,
            Self::Stop => 0xCC,
        }
    }
}

fn request(name: &str, value: f64) -> ControlRequest {
    ControlRequest::new(new_request_id(), name, value, now_epoch_ms())
}

fn switch(enable: bool) -> f64 {
    if enable { ENABLE } else { DISABLE }
}

impl<T: RegisterTransport> ControlSession<T> {
    pub async fn set_ems_mode(&self, mode: EmsMode) -> ControlResult {
        self.write_by_name(EMS_MODE_SELECTION, mode.code() as f64).await
    }

    /// 切到强制模式并下发充放电命令；`power_w > 0` 时再写功率
    pub async fn set_battery_forced_mode(
        &self,
        command: BatteryCommand,
        power_w: f64,
    ) -> Vec<ControlResult> {
        let mut requests = vec![
            request(EMS_MODE_SELECTION, EmsMode::Forced.code() as f64),
            request(BATTERY_FORCED_CMD, command.code() as f64),
        ];
        if power_w > 0.0 {
            requests.push(request(BATTERY_FORCED_POWER, power_w));
        }
        self.write_batch(requests).await
    }

    /// 同时设置 SOC 上下限，写入顺序保证每一步都满足 min ≤ max
    pub async fn set_soc_limits(&self, min_soc: f64, max_soc: f64) -> Vec<ControlResult> {
        let current_max = self.snapshot().await.numeric(MAX_SOC);
        let min = request(MIN_SOC, min_soc);
        let max = request(MAX_SOC, max_soc);
        // 新下限不超过当前上限时先写下限，否则先抬高上限
        let requests = match current_max {
            Some(current_max) if min_soc <= current_max => vec![min, max],
            _ => vec![max, min],
        };
        self.write_batch(requests).await
    }

    /// 设置馈网功率限制并开关限制功能
    pub async fn set_export_power_limit(&self, limit_w: f64, enable: bool) -> Vec<ControlResult> {
        self.write_batch(vec![
            request(EXPORT_POWER_LIMIT, limit_w),
            request(EXPORT_POWER_LIMIT_MODE, switch(enable)),
        ])
        .await
    }

    pub async fn set_backup_mode(&self, enable: bool) -> ControlResult {
        self.write_by_name(BACKUP_MODE, switch(enable)).await
    }

    pub async fn set_backup_reserve_soc(&self, soc: f64) -> ControlResult {
        self.write_by_name(BACKUP_RESERVE_SOC, soc).await
    }

    /// 读取运行状态码；未知状态码返回 `Ok(None)`
    pub async fn system_state(&self) -> Result<Option<SystemState>, ControlError> {
        let value = self.read_by_name(SYSTEM_STATE).await?;
        Ok(value
            .as_f64()
            .and_then(|code| u16::try_from(code as i64).ok())
            .and_then(SystemState::from_code))
    }
}
