//! 物理链路抽象
//!
//! 传输层只通过这两个 trait 访问设备，测试中可替换为内存实现。

use crate::error::TransportError;
use async_trait::async_trait;

/// 已建立的 Modbus 链路（单个从站）
#[async_trait]
pub trait ModbusLink: Send {
    /// 读输入寄存器 (0x04)
    async fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// 读保持寄存器 (0x03)
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// 写单个寄存器 (0x06)
    async fn write_single_register(&mut self, address: u16, value: u16)
        -> Result<(), TransportError>;

    /// 关闭链路
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// 链路建立器
#[async_trait]
pub trait LinkConnector: Send + Sync {
    type Link: ModbusLink;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        unit_id: u8,
    ) -> Result<Self::Link, TransportError>;
}
