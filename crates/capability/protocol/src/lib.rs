//! # 协议通信能力模块
//!
//! 管理到单个逆变器的唯一一条 Modbus TCP 会话，提供字级寄存器 I/O：
//!
//! - **读**：读输入寄存器 (0x04) / 读保持寄存器 (0x03)，连接类错误按退避策略透明重连重试
//! - **写**：写单个寄存器 (0x06)，从不自动重试
//! - **限速**：相邻请求之间强制最小间隔
//!
//! ## 架构设计
//!
//! ```text
//! ControlSession
//!       │  (Mutex，串行化所有 I/O)
//!       ▼
//! ModbusTransport ── 状态机 / 超时 / 限速 / 退避
//!       │
//!       ▼
//! LinkConnector → ModbusLink (tokio-modbus TCP，测试中为内存实现)
//! ```
//!
//! ## 配置格式
//!
//! ```json
//! { "host": "192.168.1.100", "port": 502, "unit_id": 1,
//!   "request_timeout_ms": 10000, "min_request_interval_ms": 100,
//!   "retry": { "max_attempts": 3, "base_delay_ms": 500, "max_delay_ms": 30000, "jitter_ms": 250 } }
//! ```

mod backoff;
mod error;
mod link;
mod modbus_tcp;
mod transport;
mod types;

pub use backoff::RetryPolicy;
pub use error::TransportError;
pub use link::{LinkConnector, ModbusLink};
pub use modbus_tcp::{TokioModbusConnector, TokioModbusLink};
pub use transport::{ModbusTransport, RegisterTransport};
pub use types::*;
