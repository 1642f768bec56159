//! # 写入安全校验能力模块
//!
//! 控制意图与任何网络写入之间的唯一关口。校验是
//! `(request, catalog, snapshot, pending)` 的纯函数，不做 I/O，必须在编码/写入之前执行。
//!
//! 检查顺序：
//!
//! 1. 寄存器不存在或不可写 → `NotWritable`
//! 2. 声明了 `safe_range` 且期望值越界 → `OutOfRange`
//! 3. 声明了 `legal_values` 且编码后整数不在集合中 → `IllegalValue`
//! 4. 声明了跨字段约束且与伙伴寄存器的值冲突 → `CrossFieldViolation`
//!
//! 伙伴寄存器的值优先取同批次中待写入的值，其次取快照中的当前值。
//! 两者都没有时以 `partner_value: None` 拒绝；校验本身从不为补齐伙伴值发起读取。
//!
//! [`write_order`] 给出通过校验的批次的执行顺序，使跨字段约束在设备上逐步成立。

use domain::{ControlRequest, RegisterDefinition, RejectReason, Snapshot};
use invlink_catalog::Catalog;
use tracing::debug;

/// 校验单个写请求。
///
/// `pending` 是与本请求同批次的其它请求（可为空）；同名请求按最后一个生效。
pub fn validate<'a>(
    request: &ControlRequest,
    catalog: &'a Catalog,
    snapshot: &Snapshot,
    pending: &[ControlRequest],
) -> Result<&'a RegisterDefinition, RejectReason> {
    let result = check(request, catalog, snapshot, pending);
    if let Err(reason) = &result {
        debug!(
            target: "invlink.safety",
            request_id = %request.request_id,
            register = %request.register_name,
            desired_value = request.desired_value,
            reason = %reason,
            "write_request_rejected"
        );
    }
    result
}

/// 批量校验：每个请求都把同批次的其余请求视为“同时请求”的伙伴值。
pub fn validate_batch<'a>(
    requests: &[ControlRequest],
    catalog: &'a Catalog,
    snapshot: &Snapshot,
) -> Vec<Result<&'a RegisterDefinition, RejectReason>> {
    requests
        .iter()
        .enumerate()
        .map(|(index, request)| {
            let others: Vec<ControlRequest> = requests
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, other)| other.clone())
                .collect();
            validate(request, catalog, snapshot, &others)
        })
        .collect()
}

/// 批量写入的执行顺序（请求下标）。
///
/// 请求的跨字段伙伴也在待写集合中时，只有新值与伙伴在快照中的当前值也满足约束，
/// 才能先于伙伴写入。每一步取第一个可以先写的请求；都不行时（伙伴当前值未知）
/// 保持调用方顺序。
pub fn write_order(requests: &[ControlRequest], catalog: &Catalog, snapshot: &Snapshot) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..requests.len()).collect();
    let mut order = Vec::with_capacity(requests.len());
    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .position(|&index| {
                holds_before_partner(&requests[index], &remaining, requests, catalog, snapshot)
            })
            .unwrap_or(0);
        order.push(remaining.remove(next));
    }
    order
}

fn holds_before_partner(
    request: &ControlRequest,
    remaining: &[usize],
    requests: &[ControlRequest],
    catalog: &Catalog,
    snapshot: &Snapshot,
) -> bool {
    let Some(rule) = catalog
        .lookup(&request.register_name)
        .ok()
        .and_then(|definition| definition.rules.cross_field.as_ref())
    else {
        return true;
    };
    let partner = rule.partner();
    if !remaining.iter().any(|&index| requests[index].register_name == partner) {
        return true;
    }
    snapshot
        .numeric(partner)
        .is_some_and(|current| rule.holds(request.desired_value, current))
}

fn check<'a>(
    request: &ControlRequest,
    catalog: &'a Catalog,
    snapshot: &Snapshot,
    pending: &[ControlRequest],
) -> Result<&'a RegisterDefinition, RejectReason> {
    let definition = catalog
        .lookup(&request.register_name)
        .map_err(|_| RejectReason::NotWritable)?;
    if !definition.writable {
        return Err(RejectReason::NotWritable);
    }

    let value = request.desired_value;
    let rules = &definition.rules;

    if let Some(range) = rules.safe_range {
        if !range.contains(value) {
            return Err(RejectReason::OutOfRange {
                value,
                min: range.min,
                max: range.max,
            });
        }
    }

    if let Some(legal) = &rules.legal_values {
        match invlink_codec::encoded_integer(value, definition) {
            Ok(raw) if legal.contains(&raw) => {}
            Ok(raw) => return Err(RejectReason::IllegalValue { raw: Some(raw) }),
            Err(_) => return Err(RejectReason::IllegalValue { raw: None }),
        }
    }

    if let Some(rule) = &rules.cross_field {
        let partner = rule.partner();
        let partner_value = pending
            .iter()
            .rev()
            .find(|other| other.register_name == partner)
            .map(|other| other.desired_value)
            .or_else(|| snapshot.numeric(partner));
        match partner_value {
            Some(partner_value) if rule.holds(value, partner_value) => {}
            partner_value => {
                return Err(RejectReason::CrossFieldViolation {
                    partner: partner.to_string(),
                    partner_value,
                });
            }
        }
    }

    Ok(definition)
}
