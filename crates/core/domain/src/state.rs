/// 逆变器系统状态寄存器的取值。
///
/// 不同固件对同一状态会上报两种编码，`from_code` 同时接受两者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    Running,
    OffGridCharge,
    UpdateFailed,
    MaintainMode,
    ForcedMode,
    OffGridMode,
    Uninitialized,
    InitialStandby,
    Shutdown,
    Standby,
    EmergencyStop,
    Startup,
    AfciSelfTest,
    IntelligentStation,
    SafeMode,
    OpenLoop,
    Restarting,
    ExternalEmsMode,
    EmergencyBatteryCharging,
    Fault,
    Stop,
    DeratingRunning,
    DispatchRun,
    WarnRunning,
}

impl SystemState {
    pub fn from_code(code: u16) -> Option<Self> {
        let state = match code {
            0x0000 | 0x0040 => Self::Running,
            0x0410 => Self::OffGridCharge,
            0x0200 => Self::UpdateFailed,
            0x0400 => Self::MaintainMode,
            0x0800 => Self::ForcedMode,
            0x1000 => Self::OffGridMode,
            0x1111 => Self::Uninitialized,
            0x0010 | 0x1200 => Self::InitialStandby,
            0x1300 | 0x0002 => Self::Shutdown,
            0x1400 | 0x0008 => Self::Standby,
            0x1500 | 0x0004 => Self::EmergencyStop,
            0x1600 | 0x0020 => Self::Startup,
            0x1700 => Self::AfciSelfTest,
            0x1800 => Self::IntelligentStation,
            0x1900 => Self::SafeMode,
            0x2000 => Self::OpenLoop,
            0x2501 => Self::Restarting,
            0x4000 => Self::ExternalEmsMode,
            0x4001 => Self::EmergencyBatteryCharging,
            0x5500 | 0x0100 => Self::Fault,
            0x8000 | 0x0001 => Self::Stop,
            0x8100 | 0x0080 => Self::DeratingRunning,
            0x8200 => Self::DispatchRun,
            0x9100 => Self::WarnRunning,
            _ => return None,
        };
        Some(state)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::OffGridCharge => "Off-grid Charge",
            Self::UpdateFailed => "Update Failed",
            Self::MaintainMode => "Maintain Mode",
            Self::ForcedMode => "Forced Mode",
            Self::OffGridMode => "Off-grid Mode",
            Self::Uninitialized => "Uninitialized",
            Self::InitialStandby => "Initial Standby",
            Self::Shutdown => "Shutdown",
            Self::Standby => "Standby",
            Self::EmergencyStop => "Emergency Stop",
            Self::Startup => "Startup",
            Self::AfciSelfTest => "AFCI Self Test",
            Self::IntelligentStation => "Intelligent Station",
            Self::SafeMode => "Safe Mode",
            Self::OpenLoop => "Open Loop",
            Self::Restarting => "Restarting",
            Self::ExternalEmsMode => "External EMS Mode",
            Self::EmergencyBatteryCharging => "Emergency Battery Charging",
            Self::Fault => "Fault",
            Self::Stop => "Stop",
            Self::DeratingRunning => "Derating Running",
            Self::DispatchRun => "Dispatch Run",
            Self::WarnRunning => "Warn Running",
        }
    }

    /// 未知编码时给出十六进制描述
    pub fn describe(code: u16) -> String {
        match Self::from_code(code) {
            Some(state) => state.label().to_string(),
            None => format!("Unknown State (0x{:04X})", code),
        }
    }
}
