//! 单设备会话传输
//!
//! 一个 [`ModbusTransport`] 只持有一条到设备的逻辑会话。读请求在连接类错误
//! （断开、超时）上按退避策略透明重连重试；写请求从不自动重试。

use crate::backoff::RetryPolicy;
use crate::error::TransportError;
use crate::link::{LinkConnector, ModbusLink};
use crate::types::{TransportConfig, TransportState, TransportStats};
use async_trait::async_trait;
use domain::ReadFunction;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// 字级寄存器 I/O 接口
#[async_trait]
pub trait RegisterTransport: Send {
    /// 建立会话
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// 读取 `count` 个寄存器字
    async fn read_words(
        &mut self,
        address: u16,
        count: u16,
        function: ReadFunction,
    ) -> Result<Vec<u16>, TransportError>;

    /// 写单个寄存器，失败时不重试
    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), TransportError>;

    /// 释放会话（幂等）
    async fn disconnect(&mut self);

    fn state(&self) -> TransportState;
}

type LinkFuture<'l, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'l>>;

#[derive(Debug, Clone)]
struct Endpoint {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

/// Modbus 会话传输
pub struct ModbusTransport<C: LinkConnector> {
    connector: C,
    config: TransportConfig,
    link: Option<C::Link>,
    endpoint: Option<Endpoint>,
    state: TransportState,
    last_request: Option<Instant>,
    stats: TransportStats,
}

impl<C: LinkConnector> ModbusTransport<C> {
    pub fn new(connector: C, config: TransportConfig) -> Self {
        Self {
            connector,
            config,
            link: None,
            endpoint: None,
            state: TransportState::Disconnected,
            last_request: None,
            stats: TransportStats::default(),
        }
    }

    /// 按配置中的主机、端口和连接超时建立会话
    pub async fn open(&mut self) -> Result<(), TransportError> {
        let host = self.config.host.clone();
        let timeout = self.config.connect_timeout();
        self.connect(&host, self.config.port, timeout).await
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    async fn establish(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.state = TransportState::Connecting;
        let connect = self
            .connector
            .connect(&endpoint.host, endpoint.port, self.config.unit_id);
        let result = match timeout(endpoint.connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "connect to {}:{} exceeded {:?}",
                endpoint.host, endpoint.port, endpoint.connect_timeout
            ))),
        };
        match result {
            Ok(link) => {
                self.link = Some(link);
                self.state = TransportState::Connected;
                Ok(())
            }
            Err(err) => {
                self.link = None;
                self.state = TransportState::Disconnected;
                Err(err)
            }
        }
    }

    /// 会话已关闭但端点仍在时重新建立
    async fn ensure_link(&mut self) -> Result<(), TransportError> {
        if self.link.is_some() {
            return Ok(());
        }
        let endpoint = self.endpoint.clone().ok_or(TransportError::NotOpen)?;
        self.establish(&endpoint).await
    }

    /// 丢弃当前链路，保留端点以便下一次请求重连
    async fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(err) = link.disconnect().await {
                debug!(target: "invlink.protocol", error = %err, "link_close_failed");
            }
        }
        self.state = TransportState::Disconnected;
    }

    /// 相邻请求之间至少间隔 `min_request_interval`
    async fn pace(&mut self) {
        let interval = self.config.min_request_interval();
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
    }

    /// 发出一次请求帧并施加请求超时
    async fn request<T, F>(&mut self, op: &'static str, call: F) -> Result<T, TransportError>
    where
        F: for<'l> FnOnce(&'l mut C::Link) -> LinkFuture<'l, T>,
    {
        self.pace().await;
        let request_timeout = self.config.request_timeout();
        let link = self.link.as_mut().ok_or(TransportError::NotOpen)?;
        self.stats.requests += 1;
        let result = match timeout(request_timeout, call(link)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "{} exceeded {:?}",
                op, request_timeout
            ))),
        };
        self.last_request = Some(Instant::now());
        result
    }

    async fn try_read(
        &mut self,
        address: u16,
        count: u16,
        function: ReadFunction,
    ) -> Result<Vec<u16>, TransportError> {
        self.ensure_link().await?;
        let words = match function {
            ReadFunction::Input => {
                self.request("read_input_registers", move |link| {
                    link.read_input_registers(address, count)
                })
                .await?
            }
            ReadFunction::Holding => {
                self.request("read_holding_registers", move |link| {
                    link.read_holding_registers(address, count)
                })
                .await?
            }
        };
        if words.len() != count as usize {
            return Err(TransportError::Protocol(format!(
                "expected {} registers at {}, got {}",
                count,
                address,
                words.len()
            )));
        }
        Ok(words)
    }
}

#[async_trait]
impl<C> RegisterTransport for ModbusTransport<C>
where
    C: LinkConnector,
    C::Link: Send,
{
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.drop_link().await;
        let endpoint = Endpoint {
            host: host.to_string(),
            port,
            connect_timeout: timeout,
        };
        match self.establish(&endpoint).await {
            Ok(()) => {
                info!(
                    target: "invlink.protocol",
                    host = %endpoint.host,
                    port = endpoint.port,
                    unit_id = self.config.unit_id,
                    "transport_connected"
                );
                self.endpoint = Some(endpoint);
                Ok(())
            }
            Err(err) => {
                self.endpoint = None;
                warn!(
                    target: "invlink.protocol",
                    host = %endpoint.host,
                    port = endpoint.port,
                    error = %err,
                    "transport_connect_failed"
                );
                Err(err)
            }
        }
    }

    async fn read_words(
        &mut self,
        address: u16,
        count: u16,
        function: ReadFunction,
    ) -> Result<Vec<u16>, TransportError> {
        let policy = self.retry_policy();
        let mut attempt = 0u32;
        loop {
            let err = match self.try_read(address, count, function).await {
                Ok(words) => return Ok(words),
                Err(err) => err,
            };
            if err.is_retryable() {
                self.drop_link().await;
            }
            if !err.is_retryable() || attempt >= policy.max_attempts {
                warn!(
                    target: "invlink.protocol",
                    register = address,
                    count,
                    attempts = attempt,
                    error = %err,
                    "transport_read_failed"
                );
                return Err(err);
            }

            let delay = policy.next_delay(attempt);
            warn!(
                target: "invlink.protocol",
                register = address,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transport_reconnect_scheduled"
            );
            self.stats.backoff_delays.push(delay);
            sleep(delay).await;
            self.stats.reconnect_attempts += 1;
            invlink_telemetry::record_reconnect();
            attempt += 1;
        }
    }

    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
        // 请求帧尚未发出，重新打开会话不会造成重复写入
        self.ensure_link().await?;
        let result = self
            .request("write_single_register", move |link| {
                link.write_single_register(address, value)
            })
            .await;
        if let Err(err) = &result {
            if err.is_retryable() {
                self.drop_link().await;
            }
            warn!(
                target: "invlink.protocol",
                register = address,
                value,
                error = %err,
                "transport_write_failed"
            );
        }
        result
    }

    async fn disconnect(&mut self) {
        let was_open = self.link.is_some() || self.endpoint.is_some();
        self.drop_link().await;
        self.endpoint = None;
        if was_open {
            info!(target: "invlink.protocol", "transport_disconnected");
        }
    }

    fn state(&self) -> TransportState {
        self.state
    }
}
