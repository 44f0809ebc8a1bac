use serde::{Deserialize, Serialize};

use crate::proto::newreno::{CongestionController, CongestionState, UNBOUNDED_SSTHRESH};
use crate::sim::SimTime;

/// 遥测事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEventKind {
    /// 新一轮传输开始（控制器为初始状态）
    RoundStart { round: u32 },
    /// 收到有效 ACK
    Ack { packet_id: u64, rtt_ms: f64 },
    /// 超时判定丢包
    Loss {
        packet_id: u64,
        persistent: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        retransmitted_as: Option<u64>,
    },
    /// 本轮传输结束
    RoundEnd { round: u32, acked: u64, lost: u64 },
}

/// 一条遥测记录：时间点上的控制器快照 + 触发事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// 会话时间（纳秒，和 `SimTime.0` 同口径）
    pub t_ns: u64,
    pub cwnd_bytes: u64,
    /// cwnd（MSS 个数）
    pub cwnd_segments: f64,
    /// 丢包前为 `None`（无穷大）
    pub ssthresh_bytes: Option<u64>,
    pub estimated_rtt_ms: f64,
    pub rtt_deviation_ms: f64,
    pub state: CongestionState,
    pub loss_detected: bool,
    #[serde(flatten)]
    pub kind: TelemetryEventKind,
}

impl TelemetryEvent {
    pub fn snapshot(t: SimTime, cc: &CongestionController, kind: TelemetryEventKind) -> Self {
        let ssthresh = cc.slow_start_threshold();
        Self {
            t_ns: t.0,
            cwnd_bytes: cc.congestion_window(),
            cwnd_segments: cc.congestion_window_segments(),
            ssthresh_bytes: (ssthresh != UNBOUNDED_SSTHRESH).then_some(ssthresh),
            estimated_rtt_ms: cc.estimated_rtt_ms(),
            rtt_deviation_ms: cc.rtt_deviation_ms(),
            state: cc.get_congestion_state(),
            loss_detected: cc.loss_detected(),
            kind,
        }
    }
}

/// 一个简单的事件收集器（存内存，会话结束写 JSON 文件）
#[derive(Debug, Default)]
pub struct TelemetryLog {
    pub events: Vec<TelemetryEvent>,
}

impl TelemetryLog {
    pub fn push(&mut self, ev: TelemetryEvent) {
        self.events.push(ev);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `(t_ns, cwnd_bytes, estimated_rtt_ms, state)` 时间序列
    pub fn series(&self) -> impl Iterator<Item = (u64, u64, f64, CongestionState)> + '_ {
        self.events
            .iter()
            .map(|e| (e.t_ns, e.cwnd_bytes, e.estimated_rtt_ms, e.state))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }
}
