//! 重连退避策略
//!
//! 延迟是尝试次数的纯函数：`delay = min(max_delay, base * 2^attempt)`，
//! 抖动是独立的纯函数，输入 `[-1, 1]` 的采样值，结果钳制在 `[0, max_delay]`。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 读路径重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最多重连重试次数（0 表示不重试）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 第 0 次重试的基础延迟（毫秒）
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// 延迟上限（毫秒）
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// 抖动幅度（毫秒，±）
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_jitter() -> u64 {
    250
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次重试（从 0 开始）的无抖动延迟
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// 叠加抖动，`sample` 取值 `[-1, 1]`
    pub fn jittered(&self, delay: Duration, sample: f64) -> Duration {
        let sample = sample.clamp(-1.0, 1.0);
        let offset = sample * self.jitter_ms as f64;
        let millis = (delay.as_millis() as f64 + offset).clamp(0.0, self.max_delay_ms as f64);
        Duration::from_millis(millis.round() as u64)
    }

    /// 带随机抖动的延迟（jitter_ms 为 0 时与 `delay_for` 相同）
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter_ms == 0 {
            return delay;
        }
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        self.jittered(delay, sample)
    }
}
