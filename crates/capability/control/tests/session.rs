use async_trait::async_trait;
use domain::{ControlOutcome, ControlRequest, EngineeringValue, ReadFunction, RejectReason, SystemState};
use invlink_catalog::Catalog;
use invlink_control::{BatteryCommand, ControlError, ControlSession, EmsMode};
use invlink_protocol::{RegisterTransport, TransportError, TransportState};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SAMPLE: &str = include_str!("../../../../config/registers.yaml");

#[derive(Default)]
struct Calls {
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// 内存设备：地址 → 寄存器字
#[derive(Default)]
struct FakeTransport {
    registers: Arc<Mutex<BTreeMap<u16, u16>>>,
    calls: Arc<Calls>,
    write_log: Arc<Mutex<Vec<(u16, u16)>>>,
    /// 写入被确认但设备不生效
    ignore_writes: bool,
    fail_writes: bool,
    fail_reads: HashSet<u16>,
    state: TransportState,
}

impl FakeTransport {
    fn with(registers: &[(u16, u16)]) -> Self {
        let transport = Self::default();
        transport.registers.lock().unwrap().extend(registers.iter().copied());
        transport
    }
}

#[async_trait]
impl RegisterTransport for FakeTransport {
    async fn connect(&mut self, _host: &str, _port: u16, _timeout: Duration) -> Result<(), TransportError> {
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn read_words(
        &mut self,
        address: u16,
        count: u16,
        _function: ReadFunction,
    ) -> Result<Vec<u16>, TransportError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.contains(&address) {
            return Err(TransportError::Timeout("read".to_string()));
        }
        let registers = self.registers.lock().unwrap();
        Ok((0..count)
            .map(|offset| registers.get(&(address + offset)).copied().unwrap_or(0))
            .collect())
    }

    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        self.write_log.lock().unwrap().push((address, value));
        if self.fail_writes {
            return Err(TransportError::Timeout("write".to_string()));
        }
        if !self.ignore_writes {
            self.registers.lock().unwrap().insert(address, value);
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }
}

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_yaml_str(SAMPLE).expect("sample catalog"))
}

fn new_session(transport: FakeTransport) -> (ControlSession<FakeTransport>, Arc<Calls>, Arc<Mutex<Vec<(u16, u16)>>>) {
    let calls = transport.calls.clone();
    let log = transport.write_log.clone();
    (ControlSession::new(catalog(), transport), calls, log)
}

#[tokio::test]
async fn read_by_name_decodes_and_updates_snapshot() {
    // "SH10RT" + NUL 填充
    let serial = [(4989, 0x5348), (4990, 0x3130), (4991, 0x5254)];
    let mut registers = vec![(13022, 542), (5016, 0x0000), (5017, 0x0010)];
    registers.extend(serial);
    let (session, _, _) = new_session(FakeTransport::with(&registers));

    assert_eq!(
        session.read_by_name("battery_level").await.expect("read"),
        EngineeringValue::Float(54.2)
    );
    assert_eq!(
        session.read_by_name("total_dc_power").await.expect("read"),
        EngineeringValue::Integer(1_048_576)
    );
    assert_eq!(
        session.read_by_name("inverter_serial").await.expect("read").as_text(),
        Some("SH10RT")
    );

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.numeric("battery_level"), Some(54.2));
}

#[tokio::test]
async fn read_errors_propagate_unchanged() {
    let mut transport = FakeTransport::default();
    transport.fail_reads.insert(13022);
    let (session, _, _) = new_session(transport);

    assert_eq!(
        session.read_by_name("battery_level").await,
        Err(ControlError::Transport(TransportError::Timeout("read".to_string())))
    );
    assert!(matches!(
        session.read_by_name("nope").await,
        Err(ControlError::Catalog(_))
    ));
    assert!(session.snapshot().await.is_empty());
}

#[tokio::test]
async fn read_many_keeps_request_order() {
    let (session, _, _) = new_session(FakeTransport::with(&[(13022, 900), (12999, 0x0002)]));
    let results = session.read_many(&["system_state", "missing", "battery_level"]).await;
    let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["system_state", "missing", "battery_level"]);
    assert!(results[1].1.is_err());
    assert_eq!(results[2].1, Ok(EngineeringValue::Float(90.0)));
}

#[tokio::test]
async fn illegal_mode_is_rejected_without_io() {
    let (session, calls, _) = new_session(FakeTransport::default());
    let result = session.write_by_name("ems_mode_selection", 1.0).await;

    assert_eq!(
        result.outcome,
        ControlOutcome::Rejected(RejectReason::IllegalValue { raw: Some(1) })
    );
    assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn read_only_register_is_not_writable() {
    let (session, calls, _) = new_session(FakeTransport::default());
    for name in ["battery_level", "legacy_active_power", "unknown"] {
        let result = session.write_by_name(name, 1.0).await;
        assert_eq!(result.outcome, ControlOutcome::Rejected(RejectReason::NotWritable));
    }
    assert_eq!(calls.reads.load(Ordering::SeqCst) + calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_write_is_verified_and_recorded() {
    let (session, calls, log) = new_session(FakeTransport::default());
    let result = session.write_by_name("export_power_limit", 4600.0).await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.applied_raw_value, Some(4600));
    assert_eq!(result.readback_value, Some(EngineeringValue::Integer(4600)));
    assert!(!result.request_id.is_empty());
    assert_eq!(*log.lock().unwrap(), vec![(13073, 4600)]);
    assert_eq!(calls.reads.load(Ordering::SeqCst), 1);
    assert_eq!(session.snapshot().await.numeric("export_power_limit"), Some(4600.0));
}

#[tokio::test]
async fn ignored_write_is_verification_mismatch() {
    let mut transport = FakeTransport::with(&[(13086, 0x55)]);
    transport.ignore_writes = true;
    let (session, _, _) = new_session(transport);

    let result = session.write_by_name("export_power_limit_mode", 0xAA as f64).await;
    assert_eq!(result.outcome, ControlOutcome::VerificationMismatch);
    assert_eq!(result.applied_raw_value, Some(0xAA));
    assert_eq!(result.readback_value, Some(EngineeringValue::Integer(0x55)));
    // 快照反映设备真实状态
    assert_eq!(session.snapshot().await.numeric("export_power_limit_mode"), Some(85.0));
}

#[tokio::test]
async fn failed_write_is_not_retried() {
    let mut transport = FakeTransport::default();
    transport.fail_writes = true;
    let (session, calls, _) = new_session(transport);

    let result = session
        .write_by_name("battery_forced_charge_discharge_cmd", 0xAA as f64)
        .await;
    assert!(matches!(result.outcome, ControlOutcome::TransportFailure { .. }));
    assert_eq!(result.applied_raw_value, None);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 1);
    assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn soc_writes_respect_ranges_and_current_partner() {
    // max_soc = 60.0%
    let (session, calls, _) = new_session(FakeTransport::with(&[(13057, 600)]));
    session.read_by_name("max_soc").await.expect("max_soc");

    let result = session.write_by_name("min_soc", 45.0).await;
    assert!(result.is_success(), "{:?}", result);

    let result = session.write_by_name("max_soc", 40.0).await;
    assert!(matches!(result.outcome, ControlOutcome::Rejected(RejectReason::OutOfRange { .. })));

    // 上限降到 50 仍不低于下限 45
    let result = session.write_by_name("max_soc", 50.0).await;
    assert!(result.is_success(), "{:?}", result);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn min_soc_above_current_max_is_cross_field_violation() {
    // 设备上的上限为 30%
    let (session, calls, _) = session_with_max(300);
    session.read_by_name("max_soc").await.expect("max_soc");
    let reads_before = calls.reads.load(Ordering::SeqCst);

    let result = session.write_by_name("min_soc", 45.0).await;
    assert_eq!(
        result.outcome,
        ControlOutcome::Rejected(RejectReason::CrossFieldViolation {
            partner: "max_soc".to_string(),
            partner_value: Some(30.0)
        })
    );
    assert_eq!(calls.reads.load(Ordering::SeqCst), reads_before);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

fn session_with_max(raw_max: u16) -> (ControlSession<FakeTransport>, Arc<Calls>, Arc<Mutex<Vec<(u16, u16)>>>) {
    new_session(FakeTransport::with(&[(13057, raw_max)]))
}

#[tokio::test]
async fn unknown_partner_is_rejected_without_io() {
    let (session, calls, _) = session_with_max(300);
    let result = session.write_by_name("min_soc", 45.0).await;

    assert_eq!(
        result.outcome,
        ControlOutcome::Rejected(RejectReason::CrossFieldViolation {
            partner: "max_soc".to_string(),
            partner_value: None
        })
    );
    assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
    assert!(session.snapshot().await.is_empty());
}

#[tokio::test]
async fn rejected_batch_performs_no_io() {
    let (session, calls, _) = session_with_max(800);
    let results = session
        .write_batch(vec![
            ControlRequest::new("a", "ems_mode_selection", 1.0, 0),
            ControlRequest::new("b", "min_soc", 20.0, 0),
        ])
        .await;

    assert_eq!(
        results[0].outcome,
        ControlOutcome::Rejected(RejectReason::IllegalValue { raw: Some(1) })
    );
    assert_eq!(
        results[1].outcome,
        ControlOutcome::Rejected(RejectReason::CrossFieldViolation {
            partner: "max_soc".to_string(),
            partner_value: None
        })
    );
    assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_partners_reads_missing_partners_once() {
    let (session, calls, _) = session_with_max(800);
    session.refresh_partners(&["min_soc"]).await.expect("refresh");
    assert_eq!(calls.reads.load(Ordering::SeqCst), 1);
    assert_eq!(session.snapshot().await.numeric("max_soc"), Some(80.0));

    // 已在快照中的伙伴不再读取，无跨字段规则的寄存器不触发读取
    session
        .refresh_partners(&["min_soc", "export_power_limit"])
        .await
        .expect("refresh");
    assert_eq!(calls.reads.load(Ordering::SeqCst), 1);

    let result = session.write_by_name("min_soc", 20.0).await;
    assert!(result.is_success(), "{:?}", result);
    // 只多了一次回读
    assert_eq!(calls.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_partners_surfaces_read_errors() {
    let mut transport = FakeTransport::default();
    transport.fail_reads.insert(13057);
    let (session, calls, _) = new_session(transport);

    assert_eq!(
        session.refresh_partners(&["min_soc"]).await,
        Err(ControlError::Transport(TransportError::Timeout("read".to_string())))
    );
    assert!(matches!(
        session.refresh_partners(&["nope"]).await,
        Err(ControlError::Catalog(_))
    ));
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_writes_partners_in_a_device_safe_order() {
    // 设备上 min=10%，max=45%；调用方先给下限 48% 再给上限 95%
    let (session, _, log) = new_session(FakeTransport::with(&[(13057, 450), (13058, 100)]));
    session.read_many(&["min_soc", "max_soc"]).await;

    let results = session
        .write_batch(vec![
            ControlRequest::new("a", "min_soc", 48.0, 0),
            ControlRequest::new("b", "max_soc", 95.0, 0),
        ])
        .await;

    assert!(results.iter().all(|result| result.is_success()), "{:?}", results);
    // 结果保持调用方顺序，写入先抬高上限
    assert_eq!(results[0].request_id, "a");
    assert_eq!(results[1].request_id, "b");
    assert_eq!(*log.lock().unwrap(), vec![(13057, 950), (13058, 480)]);
}

#[tokio::test]
async fn batch_aborts_later_writes_in_execution_order() {
    let mut transport = FakeTransport::with(&[(13057, 450), (13058, 100)]);
    transport.ignore_writes = true;
    let (session, calls, _) = new_session(transport);
    session.read_many(&["min_soc", "max_soc"]).await;

    let results = session
        .write_batch(vec![
            ControlRequest::new("a", "min_soc", 48.0, 0),
            ControlRequest::new("b", "max_soc", 95.0, 0),
        ])
        .await;

    // 上限先写且未生效，下限不再写入
    assert_eq!(results[1].outcome, ControlOutcome::VerificationMismatch);
    assert_eq!(results[0].outcome, ControlOutcome::Rejected(RejectReason::BatchAborted));
    assert_eq!(calls.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_is_all_or_nothing_on_rejection() {
    let (session, calls, _) = new_session(FakeTransport::default());
    let results = session
        .write_batch(vec![
            ControlRequest::new("a", "export_power_limit", 3000.0, 0),
            ControlRequest::new("b", "export_power_limit_mode", 0x12 as f64, 0),
        ])
        .await;

    assert_eq!(results[0].outcome, ControlOutcome::Rejected(RejectReason::BatchAborted));
    assert!(matches!(
        results[1].outcome,
        ControlOutcome::Rejected(RejectReason::IllegalValue { .. })
    ));
    assert_eq!(results[0].request_id, "a");
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_stops_at_first_failure() {
    let mut transport = FakeTransport::default();
    transport.ignore_writes = true;
    let (session, calls, _) = new_session(transport);

    let results = session.set_export_power_limit(3000.0, true).await;
    assert_eq!(results[0].outcome, ControlOutcome::VerificationMismatch);
    assert_eq!(results[1].outcome, ControlOutcome::Rejected(RejectReason::BatchAborted));
    assert_eq!(calls.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn soc_limits_are_written_in_a_safe_order() {
    // 当前 min=10%，max=60%；新值 min=40%，max=95%
    let (session, _, log) = new_session(FakeTransport::with(&[(13057, 600), (13058, 100)]));
    session.read_by_name("max_soc").await.expect("max_soc");
    let results = session.set_soc_limits(40.0, 95.0).await;
    assert!(results.iter().all(|result| result.is_success()), "{:?}", results);
    assert_eq!(*log.lock().unwrap(), vec![(13058, 400), (13057, 950)]);

    // 下限超过当前上限时先抬高上限：当前 max=45%
    let (session, _, log) = new_session(FakeTransport::with(&[(13057, 450), (13058, 100)]));
    session.read_by_name("max_soc").await.expect("max_soc");
    let results = session.set_soc_limits(48.0, 90.0).await;
    assert!(results.iter().all(|result| result.is_success()), "{:?}", results);
    assert_eq!(*log.lock().unwrap(), vec![(13057, 900), (13058, 480)]);

    // 同批内 min > max 被拒绝
    let (session, calls, _) = new_session(FakeTransport::default());
    let results = session.set_soc_limits(45.0, 40.0).await;
    assert!(results.iter().all(|result| !result.is_success()));
    assert_eq!(calls.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn forced_charge_sets_mode_command_and_power() {
    let (session, _, log) = new_session(FakeTransport::default());
    let results = session.set_battery_forced_mode(BatteryCommand::Charge, 2500.0).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|result| result.is_success()), "{:?}", results);
    assert_eq!(*log.lock().unwrap(), vec![(13049, 2), (13050, 0xAA), (13051, 2500)]);

    let (session, _, log) = new_session(FakeTransport::default());
    let results = session.set_battery_forced_mode(BatteryCommand::Stop, 0.0).await;
    assert_eq!(results.len(), 2);
    assert_eq!(*log.lock().unwrap(), vec![(13049, 2), (13050, 0xCC)]);
}

#[tokio::test]
async fn named_helpers_go_through_the_validator() {
    let (session, _, log) = new_session(FakeTransport::default());
    assert!(session.set_ems_mode(EmsMode::SelfConsumption).await.is_success());
    assert!(session.set_backup_mode(false).await.is_success());
    assert!(session.set_backup_reserve_soc(20.0).await.is_success());
    assert!(matches!(
        session.set_backup_reserve_soc(120.0).await.outcome,
        ControlOutcome::Rejected(RejectReason::OutOfRange { .. })
    ));
    assert_eq!(*log.lock().unwrap(), vec![(13049, 0), (13074, 0x55), (13099, 20)]);
}

#[tokio::test]
async fn system_state_is_translated() {
    let (session, _, _) = new_session(FakeTransport::with(&[(12999, 0x0002)]));
    assert_eq!(session.system_state().await, Ok(SystemState::from_code(0x0002)));
}

#[tokio::test]
async fn connect_and_disconnect_reach_the_transport() {
    let (session, _, _) = new_session(FakeTransport::default());
    session
        .connect("192.168.1.50", 502, Duration::from_secs(5))
        .await
        .expect("connect");
    assert_eq!(session.transport_state().await, TransportState::Connected);
    session.disconnect().await;
    assert_eq!(session.transport_state().await, TransportState::Disconnected);
    assert_eq!(session.register_info("min_soc").expect("def").address, 13058);
}
