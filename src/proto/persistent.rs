//! 持续拥塞判定
//!
//! 连续丢包（中间没有任何成功 ACK）所覆盖的发送时间跨度超过阈值时，判定为持续拥塞。
//! 判定成立后清空当前连续段，重新开始累计。

use std::time::Duration;

use tracing::debug;

use crate::proto::ledger::PacketId;
use crate::sim::SimTime;

/// 未显式配置时，持续拥塞时长 = RTO × 该系数
pub const PERSISTENT_CONGESTION_THRESHOLD: u32 = 3;

#[derive(Debug, Default)]
pub struct PersistentCongestionDetector {
    start: Option<SimTime>,
    end: Option<SimTime>,
    run_len: u32,
    last_lost: Option<PacketId>,
}

impl PersistentCongestionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 任意成功 ACK 打断连续丢包段
    pub fn on_ack(&mut self) {
        self.start = None;
        self.end = None;
        self.run_len = 0;
        self.last_lost = None;
    }

    /// 记录一次丢包；返回是否构成持续拥塞。
    pub fn on_lost(&mut self, id: PacketId, time_sent: SimTime, period: Duration) -> bool {
        let start = *self.start.get_or_insert(time_sent);
        let end = self.end.map_or(time_sent, |e| e.max(time_sent));
        self.end = Some(end);
        self.run_len = self.run_len.saturating_add(1);
        self.last_lost = Some(id);

        let span = end.saturating_since(start);
        if self.run_len >= 2 && span > period {
            debug!(run_len = self.run_len, ?span, ?period, last_lost = id, "连续丢包跨度超过阈值");
            self.on_ack();
            return true;
        }
        false
    }

    pub fn run_len(&self) -> u32 {
        self.run_len
    }

    pub fn last_lost(&self) -> Option<PacketId> {
        self.last_lost
    }
}
