use async_trait::async_trait;
use domain::ReadFunction;
use invlink_protocol::{
    LinkConnector, ModbusLink, ModbusTransport, RegisterTransport, RetryPolicy, TransportConfig,
    TransportError, TransportState,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Words(Vec<u16>),
    Fail(TransportError),
    Hang,
}

#[derive(Debug, Default)]
struct Device {
    connects: u32,
    refuse_connect: bool,
    hang_connect: bool,
    script: VecDeque<Reply>,
    reads: Vec<(ReadFunction, u16, u16)>,
    writes: Vec<(u16, u16)>,
    write_reply: Option<Reply>,
}

#[derive(Clone, Default)]
struct FakeConnector {
    device: Arc<Mutex<Device>>,
}

struct FakeLink {
    device: Arc<Mutex<Device>>,
}

impl FakeConnector {
    fn scripted(replies: Vec<Reply>) -> Self {
        let connector = Self::default();
        connector.device.lock().unwrap().script = replies.into();
        connector
    }

    fn device(&self) -> std::sync::MutexGuard<'_, Device> {
        self.device.lock().unwrap()
    }
}

#[async_trait]
impl LinkConnector for FakeConnector {
    type Link = FakeLink;

    async fn connect(&self, _host: &str, _port: u16, _unit_id: u8) -> Result<FakeLink, TransportError> {
        let (refuse, hang) = {
            let mut device = self.device.lock().unwrap();
            device.connects += 1;
            (device.refuse_connect, device.hang_connect)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if refuse {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        Ok(FakeLink {
            device: self.device.clone(),
        })
    }
}

impl FakeLink {
    async fn reply(&self, function: ReadFunction, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let reply = {
            let mut device = self.device.lock().unwrap();
            device.reads.push((function, address, count));
            device
                .script
                .pop_front()
                .unwrap_or(Reply::Words(vec![0; count as usize]))
        };
        match reply {
            Reply::Words(words) => Ok(words),
            Reply::Fail(err) => Err(err),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl ModbusLink for FakeLink {
    async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.reply(ReadFunction::Input, address, count).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.reply(ReadFunction::Holding, address, count).await
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
        let reply = {
            let mut device = self.device.lock().unwrap();
            device.writes.push((address, value));
            device.write_reply.clone()
        };
        match reply {
            None | Some(Reply::Words(_)) => Ok(()),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn config(max_attempts: u32) -> TransportConfig {
    TransportConfig {
        connect_timeout_ms: 1_000,
        request_timeout_ms: 1_000,
        min_request_interval_ms: 100,
        retry: RetryPolicy {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 400,
            jitter_ms: 0,
        },
        ..TransportConfig::new("inverter.local")
    }
}

async fn connected(connector: &FakeConnector, max_attempts: u32) -> ModbusTransport<FakeConnector> {
    let mut transport = ModbusTransport::new(connector.clone(), config(max_attempts));
    transport.open().await.expect("open");
    assert_eq!(transport.state(), TransportState::Connected);
    transport
}

#[tokio::test(start_paused = true)]
async fn n_timeouts_cause_exactly_n_reconnects_with_capped_backoff() {
    let n = 4;
    let mut replies = vec![Reply::Hang; n];
    replies.push(Reply::Words(vec![542]));
    let connector = FakeConnector::scripted(replies);
    let mut transport = connected(&connector, 5).await;

    let words = transport
        .read_words(13022, 1, ReadFunction::Input)
        .await
        .expect("read after retries");
    assert_eq!(words, vec![542]);

    let stats = transport.stats();
    assert_eq!(stats.reconnect_attempts, n as u64);
    assert_eq!(stats.backoff_delays.len(), n);
    let max = Duration::from_millis(400);
    assert!(stats.backoff_delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(stats.backoff_delays.iter().all(|delay| *delay <= max));
    assert_eq!(
        stats.backoff_delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(400),
        ]
    );
    // 初次连接 + 每次重试一次重连
    assert_eq!(connector.device().connects, 1 + n as u32);
    assert_eq!(transport.state(), TransportState::Connected);
}

#[tokio::test(start_paused = true)]
async fn read_gives_up_after_max_attempts() {
    let connector = FakeConnector::scripted(vec![Reply::Hang; 5]);
    let mut transport = connected(&connector, 2).await;

    let err = transport
        .read_words(13022, 1, ReadFunction::Input)
        .await
        .expect_err("timeouts exhaust retries");
    assert!(matches!(err, TransportError::Timeout(_)));
    assert_eq!(transport.stats().reconnect_attempts, 2);
    assert_eq!(transport.stats().requests, 3);
    assert_eq!(transport.state(), TransportState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn protocol_errors_are_not_retried() {
    let connector = FakeConnector::scripted(vec![Reply::Fail(TransportError::Protocol(
        "exception: IllegalDataAddress".to_string(),
    ))]);
    let mut transport = connected(&connector, 3).await;

    let err = transport
        .read_words(1, 1, ReadFunction::Holding)
        .await
        .expect_err("exception surfaces");
    assert!(matches!(err, TransportError::Protocol(_)));
    assert_eq!(transport.stats().reconnect_attempts, 0);
    assert_eq!(transport.state(), TransportState::Connected);
}

#[tokio::test(start_paused = true)]
async fn short_response_is_protocol_error() {
    let connector = FakeConnector::scripted(vec![Reply::Words(vec![1])]);
    let mut transport = connected(&connector, 3).await;
    let err = transport
        .read_words(5016, 2, ReadFunction::Input)
        .await
        .expect_err("short frame");
    assert!(matches!(err, TransportError::Protocol(_)));
}

#[tokio::test(start_paused = true)]
async fn function_selects_register_table() {
    let connector = FakeConnector::default();
    let mut transport = connected(&connector, 0).await;
    transport.read_words(13022, 1, ReadFunction::Input).await.expect("input");
    transport.read_words(13049, 1, ReadFunction::Holding).await.expect("holding");
    assert_eq!(
        connector.device().reads,
        vec![(ReadFunction::Input, 13022, 1), (ReadFunction::Holding, 13049, 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn writes_are_never_retried() {
    let connector = FakeConnector::default();
    connector.device().write_reply = Some(Reply::Hang);
    let mut transport = connected(&connector, 5).await;

    let err = transport
        .write_word(13050, 0xAA)
        .await
        .expect_err("write times out");
    assert!(matches!(err, TransportError::Timeout(_)));
    assert_eq!(connector.device().writes, vec![(13050, 0xAA)]);
    assert_eq!(transport.stats().reconnect_attempts, 0);
    assert_eq!(connector.device().connects, 1);
}

#[tokio::test(start_paused = true)]
async fn write_reopens_a_dropped_session_before_sending() {
    let connector = FakeConnector::scripted(vec![Reply::Fail(TransportError::Connection(
        "reset by peer".to_string(),
    ))]);
    let mut transport = connected(&connector, 0).await;
    transport
        .read_words(13022, 1, ReadFunction::Input)
        .await
        .expect_err("reset");
    assert_eq!(transport.state(), TransportState::Disconnected);

    transport.write_word(13073, 5000).await.expect("write");
    assert_eq!(connector.device().connects, 2);
    assert_eq!(connector.device().writes, vec![(13073, 5000)]);
}

#[tokio::test(start_paused = true)]
async fn requests_are_paced() {
    let connector = FakeConnector::default();
    let mut transport = connected(&connector, 0).await;

    transport.read_words(1, 1, ReadFunction::Input).await.expect("first");
    let started = tokio::time::Instant::now();
    transport.read_words(2, 1, ReadFunction::Input).await.expect("second");
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent_and_closes_the_session() {
    let connector = FakeConnector::default();
    let mut transport = connected(&connector, 3).await;

    transport.disconnect().await;
    transport.disconnect().await;
    assert_eq!(transport.state(), TransportState::Disconnected);

    let err = transport
        .read_words(1, 1, ReadFunction::Input)
        .await
        .expect_err("closed");
    assert_eq!(err, TransportError::NotOpen);
    assert_eq!(connector.device().connects, 1);
}

#[tokio::test(start_paused = true)]
async fn connect_failures_are_classified() {
    let connector = FakeConnector::default();
    connector.device().refuse_connect = true;
    let mut transport = ModbusTransport::new(connector.clone(), config(3));
    let err = transport.open().await.expect_err("refused");
    assert!(matches!(err, TransportError::Connection(_)));
    assert_eq!(transport.state(), TransportState::Disconnected);

    let connector = FakeConnector::default();
    connector.device().hang_connect = true;
    let mut transport = ModbusTransport::new(connector, config(3));
    let err = transport
        .connect("10.0.0.9", 502, Duration::from_secs(5))
        .await
        .expect_err("timeout");
    assert!(matches!(err, TransportError::Timeout(_)));
    assert_eq!(transport.state(), TransportState::Disconnected);
}
