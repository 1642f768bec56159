use crate::error::ControlError;
use domain::{
    ControlOutcome, ControlRequest, ControlResult, EngineeringValue, RegisterDefinition,
    RejectReason, Snapshot, now_epoch_ms,
};
use invlink_catalog::Catalog;
use invlink_protocol::{RegisterTransport, TransportState};
use invlink_telemetry::{
    new_request_id, record_read_failure, record_read_ok, record_write_latency_ms,
    record_write_mismatch, record_write_rejected, record_write_success,
    record_write_transport_failure,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// 单设备控制会话。
///
/// 所有寄存器 I/O 经由同一把互斥锁串行执行（tokio 的 Mutex 按 FIFO 唤醒，
/// 保证按发起顺序完成）。写入与其回读确认在同一次持锁内完成。
pub struct ControlSession<T: RegisterTransport> {
    catalog: Arc<Catalog>,
    transport: Mutex<T>,
    snapshot: RwLock<Snapshot>,
}

impl<T: RegisterTransport> ControlSession<T> {
    pub fn new(catalog: Arc<Catalog>, transport: T) -> Self {
        Self {
            catalog,
            transport: Mutex::new(transport),
            snapshot: RwLock::new(Snapshot::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<(), ControlError> {
        let mut transport = self.transport.lock().await;
        transport.connect(host, port, timeout).await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.transport.lock().await.disconnect().await;
    }

    pub async fn transport_state(&self) -> TransportState {
        self.transport.lock().await.state()
    }

    /// 当前快照的副本
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub fn register_info(&self, name: &str) -> Result<&RegisterDefinition, ControlError> {
        Ok(self.catalog.lookup(name)?)
    }

    /// 按名称读取并解码，成功时更新快照
    pub async fn read_by_name(&self, name: &str) -> Result<EngineeringValue, ControlError> {
        let definition = self.catalog.lookup(name)?;
        let mut transport = self.transport.lock().await;
        self.read_locked(&mut *transport, definition).await
    }

    /// 依次读取多个寄存器，结果与输入顺序一致
    pub async fn read_many<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Vec<(String, Result<EngineeringValue, ControlError>)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            results.push((name.to_string(), self.read_by_name(name).await));
        }
        results
    }

    /// 写入单个寄存器：校验 → 编码 → 写入 → 回读确认
    pub async fn write_by_name(&self, name: &str, desired_value: f64) -> ControlResult {
        let request = ControlRequest::new(new_request_id(), name, desired_value, now_epoch_ms());
        self.execute(request).await
    }

    /// 执行一个已构造的写请求（等价于只含一个请求的批次）
    pub async fn execute(&self, request: ControlRequest) -> ControlResult {
        let fallback = ControlResult::rejected(&request, RejectReason::BatchAborted);
        self.write_batch(vec![request])
            .await
            .into_iter()
            .next()
            .unwrap_or(fallback)
    }

    /// 批量写入。
    ///
    /// 先把每个请求与同批其它请求一起校验；任一请求被拒绝则整批不写，其余请求
    /// 报告 `BatchAborted`。校验不做任何 I/O：伙伴寄存器值未知的请求直接以
    /// `CrossFieldViolation { partner_value: None }` 拒绝，需要时先调用
    /// [`refresh_partners`](Self::refresh_partners)。
    ///
    /// 全部通过后按 `write_order` 给出的顺序写入，使跨字段约束在设备上的每一步都成立；
    /// 遇到第一个非成功结果即停止。结果与输入顺序一致。
    pub async fn write_batch(&self, requests: Vec<ControlRequest>) -> Vec<ControlResult> {
        let mut transport = self.transport.lock().await;
        let (verdicts, order) = {
            let snapshot = self.snapshot.read().await;
            (
                invlink_safety::validate_batch(&requests, &self.catalog, &snapshot),
                invlink_safety::write_order(&requests, &self.catalog, &snapshot),
            )
        };

        if verdicts.iter().any(Result::is_err) {
            return requests
                .iter()
                .zip(verdicts)
                .map(|(request, verdict)| match verdict {
                    Ok(_) => self.reject(request, RejectReason::BatchAborted),
                    Err(reason) => self.reject(request, reason),
                })
                .collect();
        }

        let definitions: Vec<&RegisterDefinition> = verdicts.into_iter().flatten().collect();
        let mut results: Vec<Option<ControlResult>> = vec![None; requests.len()];
        let mut aborted = false;
        for index in order {
            let request = &requests[index];
            let result = if aborted {
                self.reject(request, RejectReason::BatchAborted)
            } else {
                let result = self
                    .apply_locked(&mut *transport, request, definitions[index])
                    .await;
                aborted = !result.is_success();
                result
            };
            results[index] = Some(result);
        }

        requests
            .iter()
            .zip(results)
            .map(|(request, result)| {
                result.unwrap_or_else(|| self.reject(request, RejectReason::BatchAborted))
            })
            .collect()
    }

    /// 读取给定寄存器的跨字段伙伴中快照还没有的那些。
    ///
    /// 这是调用方显式选择的读取步骤，写入路径本身从不为校验发起读取。
    pub async fn refresh_partners<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ControlError> {
        let mut partners = BTreeSet::new();
        for name in names {
            let definition = self.catalog.lookup(name.as_ref())?;
            if let Some(rule) = &definition.rules.cross_field {
                partners.insert(rule.partner().to_string());
            }
        }

        let mut transport = self.transport.lock().await;
        for partner in partners {
            if self.snapshot.read().await.contains(&partner) {
                continue;
            }
            let definition = self.catalog.lookup(&partner)?;
            debug!(
                target: "invlink.control",
                partner = %partner,
                "cross_field_partner_refresh"
            );
            self.read_locked(&mut *transport, definition).await?;
        }
        Ok(())
    }

    async fn read_locked(
        &self,
        transport: &mut T,
        definition: &RegisterDefinition,
    ) -> Result<EngineeringValue, ControlError> {
        let result = self.read_and_decode(transport, definition).await;
        match &result {
            Ok(value) => {
                record_read_ok();
                self.snapshot
                    .write()
                    .await
                    .upsert(definition.name.clone(), value.clone(), now_epoch_ms());
                debug!(
                    target: "invlink.control",
                    register = %definition.name,
                    value = %value,
                    "register_read"
                );
            }
            Err(err) => {
                record_read_failure();
                warn!(
                    target: "invlink.control",
                    register = %definition.name,
                    error = %err,
                    "register_read_failed"
                );
            }
        }
        result
    }

    async fn read_and_decode(
        &self,
        transport: &mut T,
        definition: &RegisterDefinition,
    ) -> Result<EngineeringValue, ControlError> {
        let words = transport
            .read_words(definition.address, definition.word_count, definition.read_function())
            .await?;
        Ok(invlink_codec::decode(&words, definition)?)
    }

    async fn apply_locked(
        &self,
        transport: &mut T,
        request: &ControlRequest,
        definition: &RegisterDefinition,
    ) -> ControlResult {
        let started = Instant::now();

        let raw = match encode_single_word(request.desired_value, definition) {
            Ok(raw) => raw,
            Err(detail) => return self.reject(request, RejectReason::EncodeFailure { detail }),
        };

        if let Err(err) = transport.write_word(definition.address, raw).await {
            return self.transport_failure(request, None, err.to_string());
        }

        let readback = match self.read_locked(transport, definition).await {
            Ok(value) => value,
            Err(err) => {
                return self.transport_failure(
                    request,
                    Some(raw),
                    format!("verification read failed: {}", err),
                );
            }
        };

        record_write_latency_ms(started.elapsed().as_millis() as u64);
        let outcome = if verified(request.desired_value, &readback, definition) {
            record_write_success();
            info!(
                target: "invlink.control",
                request_id = %request.request_id,
                register = %definition.name,
                address = definition.address,
                raw,
                readback = %readback,
                "control_write_applied"
            );
            ControlOutcome::Success
        } else {
            record_write_mismatch();
            warn!(
                target: "invlink.control",
                request_id = %request.request_id,
                register = %definition.name,
                desired_value = request.desired_value,
                readback = %readback,
                "control_write_mismatch"
            );
            ControlOutcome::VerificationMismatch
        };

        ControlResult {
            request_id: request.request_id.clone(),
            register_name: request.register_name.clone(),
            outcome,
            applied_raw_value: Some(raw),
            readback_value: Some(readback),
        }
    }

    fn reject(&self, request: &ControlRequest, reason: RejectReason) -> ControlResult {
        record_write_rejected();
        info!(
            target: "invlink.control",
            request_id = %request.request_id,
            register = %request.register_name,
            desired_value = request.desired_value,
            reason = %reason,
            "control_write_rejected"
        );
        ControlResult::rejected(request, reason)
    }

    fn transport_failure(
        &self,
        request: &ControlRequest,
        applied_raw_value: Option<u16>,
        detail: String,
    ) -> ControlResult {
        record_write_transport_failure();
        warn!(
            target: "invlink.control",
            request_id = %request.request_id,
            register = %request.register_name,
            detail = %detail,
            "control_write_transport_failure"
        );
        ControlResult {
            request_id: request.request_id.clone(),
            register_name: request.register_name.clone(),
            outcome: ControlOutcome::TransportFailure { detail },
            applied_raw_value,
            readback_value: None,
        }
    }
}

/// 可写寄存器都是 16 位，编码结果必须恰好一个字
fn encode_single_word(value: f64, definition: &RegisterDefinition) -> Result<u16, String> {
    let words = invlink_codec::encode(value, definition).map_err(|err| err.to_string())?;
    match words.as_slice() {
        [word] => Ok(*word),
        other => Err(format!("expected one register word, got {}", other.len())),
    }
}

/// 回读值与期望值相差不超过半个编码单位
fn verified(desired: f64, readback: &EngineeringValue, definition: &RegisterDefinition) -> bool {
    let Some(actual) = readback.as_f64() else {
        return false;
    };
    let epsilon = 1e-9 * desired.abs().max(1.0);
    (actual - desired).abs() <= definition.tolerance() + epsilon
}
