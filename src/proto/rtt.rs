//! RTT 估计（EWMA）
//!
//! - `estimated_rtt ← (1 − α)·estimated_rtt + α·sample`
//! - `rtt_deviation ← (1 − β)·rtt_deviation + β·|estimated_rtt − sample|`
//!
//! 第二式使用**更新后**的 `estimated_rtt`。单位统一为毫秒（f64）。

use std::time::Duration;

/// α 默认值（1/8）
pub const DEFAULT_RTT_ALPHA: f64 = 0.125;
/// β 默认值（1/4）
pub const DEFAULT_RTT_BETA: f64 = 0.25;
/// RTO = estimated_rtt + RTO_DEVIATION_FACTOR · rtt_deviation
pub const RTO_DEVIATION_FACTOR: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct RttEstimator {
    alpha: f64,
    beta: f64,
    estimated_ms: f64,
    deviation_ms: f64,
    latest_ms: Option<f64>,
    min_ms: Option<f64>,
}

impl RttEstimator {
    /// 初始估计与偏差都为 0。
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            estimated_ms: 0.0,
            deviation_ms: 0.0,
            latest_ms: None,
            min_ms: None,
        }
    }

    pub fn update(&mut self, sample_ms: f64) {
        // 负值/NaN 不可能来自真实测量
        if !sample_ms.is_finite() || sample_ms < 0.0 {
            return;
        }
        self.estimated_ms = (1.0 - self.alpha) * self.estimated_ms + self.alpha * sample_ms;
        self.deviation_ms = (1.0 - self.beta) * self.deviation_ms
            + self.beta * (self.estimated_ms - sample_ms).abs();
        self.latest_ms = Some(sample_ms);
        self.min_ms = Some(self.min_ms.map_or(sample_ms, |m| m.min(sample_ms)));
    }

    pub fn estimated_ms(&self) -> f64 {
        self.estimated_ms
    }

    pub fn deviation_ms(&self) -> f64 {
        self.deviation_ms
    }

    pub fn latest_ms(&self) -> Option<f64> {
        self.latest_ms
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.min_ms
    }

    pub fn rto_ms(&self) -> f64 {
        self.estimated_ms + RTO_DEVIATION_FACTOR * self.deviation_ms
    }

    pub fn rto(&self) -> Duration {
        Duration::from_secs_f64(self.rto_ms().max(0.0) / 1_000.0)
    }

    /// 平滑 RTT（用作恢复期长度）
    pub fn smoothed(&self) -> Duration {
        Duration::from_secs_f64(self.estimated_ms.max(0.0) / 1_000.0)
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RTT_ALPHA, DEFAULT_RTT_BETA)
    }
}
