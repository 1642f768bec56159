//! Modbus TCP 链路实现（tokio-modbus）
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let connector = TokioModbusConnector;
//! let mut link = connector.connect("192.168.1.100", 502, 1).await?;
//! let words = link.read_input_registers(13022, 1).await?;
//! ```

use crate::error::TransportError;
use crate::link::{LinkConnector, ModbusLink};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::lookup_host;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

/// 基于 tokio-modbus 的链路建立器
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioModbusConnector;

/// tokio-modbus 客户端上下文
pub struct TokioModbusLink {
    ctx: tokio_modbus::client::Context,
    peer: SocketAddr,
}

#[async_trait]
impl LinkConnector for TokioModbusConnector {
    type Link = TokioModbusLink;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        unit_id: u8,
    ) -> Result<Self::Link, TransportError> {
        let peer = resolve(host, port).await?;
        info!(target: "invlink.protocol", peer = %peer, unit_id, "modbus_connecting");
        let ctx = tcp::connect_slave(peer, Slave(unit_id))
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {}", peer, e)))?;
        info!(target: "invlink.protocol", peer = %peer, unit_id, "modbus_connected");
        Ok(TokioModbusLink { ctx, peer })
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| TransportError::Connection(format!("resolve {}:{}: {}", host, port, e)))?;
    addrs
        .next()
        .ok_or_else(|| TransportError::Connection(format!("no address for {}:{}", host, port)))
}

fn map_modbus_error(err: tokio_modbus::Error) -> TransportError {
    match err {
        tokio_modbus::Error::Transport(io) => TransportError::Connection(io.to_string()),
        tokio_modbus::Error::Protocol(protocol) => TransportError::Protocol(protocol.to_string()),
    }
}

fn map_exception(code: tokio_modbus::ExceptionCode) -> TransportError {
    TransportError::Protocol(format!("exception: {:?}", code))
}

#[async_trait]
impl ModbusLink for TokioModbusLink {
    async fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let words = self
            .ctx
            .read_input_registers(address, count)
            .await
            .map_err(map_modbus_error)?
            .map_err(map_exception)?;
        debug!(
            target: "invlink.protocol",
            peer = %self.peer,
            register = address,
            count,
            values = ?words,
            "read_input_registers"
        );
        Ok(words)
    }

    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let words = self
            .ctx
            .read_holding_registers(address, count)
            .await
            .map_err(map_modbus_error)?
            .map_err(map_exception)?;
        debug!(
            target: "invlink.protocol",
            peer = %self.peer,
            register = address,
            count,
            values = ?words,
            "read_holding_registers"
        );
        Ok(words)
    }

    async fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<(), TransportError> {
        self.ctx
            .write_single_register(address, value)
            .await
            .map_err(map_modbus_error)?
            .map_err(map_exception)?;
        debug!(
            target: "invlink.protocol",
            peer = %self.peer,
            register = address,
            value,
            "write_single_register"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.ctx
            .disconnect()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}
