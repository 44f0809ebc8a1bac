//! NewReno 拥塞控制
//!
//! 纯状态迁移逻辑，不做任何 I/O：
//! - 慢启动：每个 ACK 使 cwnd 增加被确认字节数
//! - 拥塞避免：每个 ACK 使 cwnd 增加 `mss^2 / cwnd`（至少 +1）
//! - 丢包：`ssthresh = max(cwnd / 2, 最小窗口)`，`cwnd = ssthresh`，进入恢复期
//! - 同一恢复期内、恢复开始前发出的包再丢失，不再重复减半（NewReno 与 Reno 的区别）
//! - 持续拥塞：cwnd 直接降到最小窗口
//!
//! “恢复开始前发出”按包序号判断：进入恢复期时记下已发出的最大 id（恢复点），
//! id 不超过恢复点的包都属于旧数据。同一时刻发出的包因此也能区分先后。
//!
//! 拥塞状态 [`CongestionState`] 不单独存储，始终由窗口/阈值/恢复期推导。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::ConfigError;
use crate::proto::ledger::PacketId;
use crate::proto::rtt::{DEFAULT_RTT_ALPHA, DEFAULT_RTT_BETA, RttEstimator};
use crate::sim::SimTime;

/// 默认 MSS（字节，含 8 字节 id 头）
pub const DEFAULT_MSS: u32 = 1500;
/// 初始窗口（MSS 个数）
pub const INITIAL_WINDOW_SEGMENTS: u64 = 2;
/// 最小窗口（MSS 个数）：丢包后 ssthresh 与持续拥塞后 cwnd 的下限
pub const MIN_WINDOW_SEGMENTS: u64 = 2;
/// 丢包前的 ssthresh（无穷大）
pub const UNBOUNDED_SSTHRESH: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRenoConfig {
    /// MSS（字节）
    pub mss: u32,
    /// 初始 cwnd（MSS 个数）
    pub initial_window_segments: u64,
    /// 最小窗口（MSS 个数），至少为 1
    pub min_window_segments: u64,
    /// RTT EWMA 平滑系数 α
    pub rtt_alpha: f64,
    /// RTT 偏差 EWMA 平滑系数 β
    pub rtt_beta: f64,
}

impl Default for NewRenoConfig {
    fn default() -> Self {
        Self {
            mss: DEFAULT_MSS,
            initial_window_segments: INITIAL_WINDOW_SEGMENTS,
            min_window_segments: MIN_WINDOW_SEGMENTS,
            rtt_alpha: DEFAULT_RTT_ALPHA,
            rtt_beta: DEFAULT_RTT_BETA,
        }
    }
}

impl NewRenoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mss == 0 {
            return Err(ConfigError::Invalid("mss must be positive".into()));
        }
        if self.min_window_segments == 0 {
            return Err(ConfigError::Invalid("min_window_segments must be at least 1".into()));
        }
        if self.initial_window_segments < self.min_window_segments {
            return Err(ConfigError::Invalid(format!(
                "initial_window_segments ({}) below min_window_segments ({})",
                self.initial_window_segments, self.min_window_segments
            )));
        }
        for (name, v) in [("rtt_alpha", self.rtt_alpha), ("rtt_beta", self.rtt_beta)] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ConfigError::Invalid(format!("{name} must be in (0, 1], got {v}")));
            }
        }
        Ok(())
    }

    fn mss_bytes(&self) -> u64 {
        self.mss as u64
    }

    pub fn min_window_bytes(&self) -> u64 {
        self.mss_bytes().saturating_mul(self.min_window_segments)
    }

    pub fn initial_window_bytes(&self) -> u64 {
        self.mss_bytes().saturating_mul(self.initial_window_segments)
    }
}

/// 拥塞状态（派生量）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionState {
    SlowStart,
    CongestionAvoidance,
    Recovery,
}

/// 当前恢复期
#[derive(Debug, Clone, Copy)]
struct RecoveryPeriod {
    start: SimTime,
    /// 进入恢复期时已发出的最大 id
    recover: PacketId,
}

#[derive(Debug, Clone)]
pub struct CongestionController {
    cfg: NewRenoConfig,
    congestion_window: u64,
    slow_start_threshold: u64,
    max_slow_start_threshold: u64,
    rtt: RttEstimator,
    loss_detected: bool,
    persistent_congestion: bool,
    recovery: Option<RecoveryPeriod>,
    largest_sent: PacketId,
    bytes_acked_total: u64,
}

impl CongestionController {
    /// 要求 `cfg` 已通过 [`NewRenoConfig::validate`]。
    pub fn new(cfg: NewRenoConfig) -> Self {
        let cwnd = cfg.initial_window_bytes().max(cfg.mss_bytes());
        let rtt = RttEstimator::new(cfg.rtt_alpha, cfg.rtt_beta);
        Self {
            cfg,
            congestion_window: cwnd,
            slow_start_threshold: UNBOUNDED_SSTHRESH,
            max_slow_start_threshold: 0,
            rtt,
            loss_detected: false,
            persistent_congestion: false,
            recovery: None,
            largest_sent: 0,
            bytes_acked_total: 0,
        }
    }

    /// 记录一次发送，用于确定恢复点。
    pub fn on_packet_sent(&mut self, packet_id: PacketId) {
        self.largest_sent = self.largest_sent.max(packet_id);
    }

    /// 收到 `packet_id` 的 ACK。
    ///
    /// `rtt` 为该包的 RTT 样本，`now` 为收到 ACK 的时刻。
    /// `bytes_acked == 0` 时不做任何事。
    pub fn on_ack(&mut self, packet_id: PacketId, bytes_acked: u64, rtt: Duration, now: SimTime) {
        if bytes_acked == 0 {
            trace!("忽略 0 字节 ACK");
            return;
        }
        self.bytes_acked_total = self.bytes_acked_total.saturating_add(bytes_acked);
        self.update_rtt(rtt.as_secs_f64() * 1_000.0);
        self.persistent_congestion = false;

        if let Some(rec) = self.recovery {
            // 恢复开始前发出的包：不增长窗口
            if packet_id <= rec.recover {
                trace!(packet_id, recover = rec.recover, "恢复期内的旧包 ACK");
                return;
            }
            if now.saturating_since(rec.start) < self.rtt.smoothed() {
                trace!(packet_id, recovery_start = ?rec.start, "恢复期尚未结束");
                return;
            }
            self.recovery = None;
            self.loss_detected = false;
            debug!(cwnd = self.congestion_window, ssthresh = self.slow_start_threshold, "退出恢复期");
        }

        if self.congestion_window < self.slow_start_threshold {
            self.congestion_window = self.congestion_window.saturating_add(bytes_acked);
        } else {
            let mss = self.cfg.mss_bytes();
            let inc = (mss.saturating_mul(mss) / self.congestion_window).max(1);
            self.congestion_window = self.congestion_window.saturating_add(inc);
        }
    }

    /// 检测到 `time_sent` 时刻发出的 `packet_id` 丢失。
    pub fn on_loss(&mut self, packet_id: PacketId, time_sent: SimTime, now: SimTime) {
        self.loss_detected = true;
        if let Some(rec) = self.recovery {
            if packet_id <= rec.recover {
                debug!(packet_id, ?time_sent, recover = rec.recover, "恢复期内重复丢包，不再减窗");
                return;
            }
        }
        self.cut_threshold();
        self.congestion_window = self.slow_start_threshold;
        self.enter_recovery(now, packet_id);
        info!(
            cwnd = self.congestion_window,
            ssthresh = self.slow_start_threshold,
            "丢包：进入恢复期"
        );
    }

    /// 调用方判定持续拥塞后记录的窗口削减：cwnd 回到最小窗口。
    pub fn on_persistent_congestion(&mut self, now: SimTime) {
        self.loss_detected = true;
        self.persistent_congestion = true;
        if self.recovery.is_none() {
            self.cut_threshold();
        }
        self.congestion_window = self.cfg.min_window_bytes().max(self.cfg.mss_bytes());
        let recover = self.recovery.map_or(0, |r| r.recover);
        self.enter_recovery(now, recover);
        info!(
            cwnd = self.congestion_window,
            ssthresh = self.slow_start_threshold,
            "持续拥塞：cwnd 降至最小窗口"
        );
    }

    /// EWMA 更新 RTT 估计（样本单位：毫秒）。
    pub fn update_rtt(&mut self, rtt_sample_ms: f64) {
        self.rtt.update(rtt_sample_ms);
    }

    pub fn get_congestion_state(&self) -> CongestionState {
        if self.recovery.is_some() {
            CongestionState::Recovery
        } else if self.congestion_window < self.slow_start_threshold {
            CongestionState::SlowStart
        } else {
            CongestionState::CongestionAvoidance
        }
    }

    fn enter_recovery(&mut self, now: SimTime, at_least: PacketId) {
        self.recovery = Some(RecoveryPeriod {
            start: now,
            recover: self.largest_sent.max(at_least),
        });
    }

    fn cut_threshold(&mut self) {
        self.slow_start_threshold = (self.congestion_window / 2).max(self.cfg.min_window_bytes());
        self.max_slow_start_threshold = self.max_slow_start_threshold.max(self.slow_start_threshold);
    }

    pub fn config(&self) -> &NewRenoConfig {
        &self.cfg
    }

    pub fn mss(&self) -> u32 {
        self.cfg.mss
    }

    pub fn congestion_window(&self) -> u64 {
        self.congestion_window
    }

    /// cwnd（单位：MSS 个数，浮点）
    pub fn congestion_window_segments(&self) -> f64 {
        self.congestion_window as f64 / self.cfg.mss_bytes() as f64
    }

    /// 丢包前为 [`UNBOUNDED_SSTHRESH`]。
    pub fn slow_start_threshold(&self) -> u64 {
        self.slow_start_threshold
    }

    pub fn max_slow_start_threshold(&self) -> u64 {
        self.max_slow_start_threshold
    }

    pub fn estimated_rtt_ms(&self) -> f64 {
        self.rtt.estimated_ms()
    }

    pub fn rtt_deviation_ms(&self) -> f64 {
        self.rtt.deviation_ms()
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// 建议的重传超时：`estimated_rtt + 4 · rtt_deviation`
    pub fn rto(&self) -> Duration {
        self.rtt.rto()
    }

    pub fn loss_detected(&self) -> bool {
        self.loss_detected
    }

    pub fn in_persistent_congestion(&self) -> bool {
        self.persistent_congestion
    }

    pub fn recovery_start_time(&self) -> Option<SimTime> {
        self.recovery.map(|r| r.start)
    }

    /// 恢复点：恢复期内 id 不超过它的包属于旧数据
    pub fn recovery_point(&self) -> Option<PacketId> {
        self.recovery.map(|r| r.recover)
    }

    pub fn bytes_acked_total(&self) -> u64 {
        self.bytes_acked_total
    }

    #[cfg(test)]
    pub(crate) fn force_window(&mut self, cwnd: u64, ssthresh: u64) {
        self.congestion_window = cwnd;
        self.slow_start_threshold = ssthresh;
    }
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new(NewRenoConfig::default())
    }
}
