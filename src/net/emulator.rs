//! 接收端网络条件模拟
//!
//! 对每个数据单元按概率决定：丢弃 / 正常时延后 ACK / 长时延后 ACK。
//! 随机数由种子决定，保证同一配置下结果可复现。
//!
//! 该模块只做决策与构造 ACK；真正的收发由调用方（[`super::link::EmulatedLink`]
//! 或 UDP 接收端程序）负责。

use std::collections::BTreeSet;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::net::wire::{self, END_ID, Unit};

/// 均匀分布的时延区间（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: f64,
    pub max_ms: f64,
}

impl DelayRange {
    pub const fn new(min_ms: f64, max_ms: f64) -> Self {
        Self { min_ms, max_ms }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.min_ms >= 0.0 && self.min_ms <= self.max_ms && self.max_ms.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "{name}: need 0 <= min_ms <= max_ms, got [{}, {}]",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        let ms = rng.gen_range(self.min_ms..=self.max_ms);
        Duration::from_secs_f64(ms / 1_000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 数据单元被丢弃的概率
    pub loss_probability: f64,
    /// 未丢弃时使用长时延的概率
    pub extended_delay_probability: f64,
    pub normal_delay: DelayRange,
    pub extended_delay: DelayRange,
    /// 随机数种子
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss_probability: 0.0,
            extended_delay_probability: 0.01,
            normal_delay: DelayRange::new(1.0, 10.0),
            extended_delay: DelayRange::new(150.0, 500.0),
            seed: 0x5eed,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, p) in [
            ("loss_probability", self.loss_probability),
            ("extended_delay_probability", self.extended_delay_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {p}")));
            }
        }
        self.normal_delay.validate("normal_delay")?;
        self.extended_delay.validate("extended_delay")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Drop,
    Deliver { delay: Duration, extended: bool },
}

/// 接收端对一个单元的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverAction {
    /// 经过 `delay` 后回 ACK
    Ack { ack: Vec<u8>, delay: Duration },
    /// 数据单元被丢弃
    Drop { id: u64 },
    /// 轮次开始 / 流结束：不回 ACK
    Marker,
    /// 会话终止：立即回终止 ACK
    Close { ack: Vec<u8> },
    /// 无法解析
    Malformed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub data_units: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub extended_delays: u64,
    pub rounds_started: u64,
    pub streams_finished: u64,
    pub malformed: u64,
}

#[derive(Debug)]
pub struct ReceiverEmulator {
    cfg: LinkConfig,
    rng: SmallRng,
    received: BTreeSet<u64>,
    stats: LinkStats,
    closed: bool,
}

impl ReceiverEmulator {
    /// 要求 `cfg` 已通过 [`LinkConfig::validate`]。
    pub fn new(cfg: LinkConfig) -> Self {
        let rng = SmallRng::seed_from_u64(cfg.seed);
        Self {
            cfg,
            rng,
            received: BTreeSet::new(),
            stats: LinkStats::default(),
            closed: false,
        }
    }

    pub fn verdict(&mut self) -> Verdict {
        if self.rng.gen_bool(self.cfg.loss_probability) {
            return Verdict::Drop;
        }
        let extended = self.rng.gen_bool(self.cfg.extended_delay_probability);
        let range = if extended {
            self.cfg.extended_delay
        } else {
            self.cfg.normal_delay
        };
        Verdict::Deliver {
            delay: range.sample(&mut self.rng),
            extended,
        }
    }

    pub fn on_unit(&mut self, buf: &[u8]) -> ReceiverAction {
        let unit = match wire::decode_unit(buf) {
            Ok(u) => u,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(error = %e, "接收端：无法解析的单元");
                return ReceiverAction::Malformed;
            }
        };
        match unit {
            Unit::Start => {
                self.stats.rounds_started += 1;
                ReceiverAction::Marker
            }
            Unit::Eof => {
                self.stats.streams_finished += 1;
                debug!(received = self.received.len(), "接收端：本轮传输结束");
                ReceiverAction::Marker
            }
            Unit::End => {
                self.closed = true;
                ReceiverAction::Close {
                    ack: wire::encode_ack(END_ID),
                }
            }
            Unit::Data { id, payload } => {
                self.stats.data_units += 1;
                match self.verdict() {
                    Verdict::Drop => {
                        self.stats.dropped += 1;
                        trace!(id, "接收端：丢弃");
                        ReceiverAction::Drop { id }
                    }
                    Verdict::Deliver { delay, extended } => {
                        self.stats.delivered += 1;
                        if extended {
                            self.stats.extended_delays += 1;
                        }
                        self.received.insert(id);
                        trace!(id, bytes = payload.len(), ?delay, extended, "接收端：收到");
                        ReceiverAction::Ack {
                            ack: wire::encode_ack(id as i64),
                            delay,
                        }
                    }
                }
            }
        }
    }

    pub fn has_received(&self, id: u64) -> bool {
        self.received.contains(&id)
    }

    pub fn received_count(&self) -> usize {
        self.received.len()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &LinkConfig {
        &self.cfg
    }
}
