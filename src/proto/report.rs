//! 单轮传输统计

use serde::{Deserialize, Serialize};

use crate::sim::SimTime;

/// 单个包的 RTT 样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttSample {
    pub packet_id: u64,
    /// 收到 ACK 的会话时间（纳秒）
    pub t_ns: u64,
    pub rtt_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: u32,
    /// 发出的数据单元数（含重传）
    pub data_units_sent: u64,
    pub retransmissions: u64,
    pub acked: u64,
    pub lost: u64,
    /// 未知 id / 重复 / 哨兵 ACK
    pub ignored_acks: u64,
    pub persistent_congestion_events: u64,
    /// 已确认的载荷字节数
    pub bytes_delivered: u64,
    pub started_ns: u64,
    pub finished_ns: Option<u64>,
    pub rtt_samples: Vec<RttSample>,
}

impl RoundReport {
    pub fn new(round: u32, started: SimTime) -> Self {
        Self {
            round,
            started_ns: started.0,
            ..Self::default()
        }
    }

    /// 截至每个样本为止观察到的最小 RTT（毫秒）
    pub fn min_rtt_over_time(&self) -> Vec<f64> {
        self.rtt_samples
            .iter()
            .scan(f64::INFINITY, |min, s| {
                *min = min.min(s.rtt_ms);
                Some(*min)
            })
            .collect()
    }

    pub fn duration_ns(&self) -> Option<u64> {
        self.finished_ns
            .map(|end| end.saturating_sub(self.started_ns))
    }

    /// 有效吞吐（Mbit/s）；未结束或时长为 0 时为 `None`
    pub fn goodput_mbps(&self) -> Option<f64> {
        let ns = self.duration_ns().filter(|&ns| ns > 0)?;
        // bit/ns * 1000 = Mbit/s
        Some(self.bytes_delivered as f64 * 8.0 * 1_000.0 / ns as f64)
    }
}
