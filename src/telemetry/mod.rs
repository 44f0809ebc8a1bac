//! 拥塞控制遥测（用于离线绘图/分析）
//!
//! 每个 ACK / 丢包事件记录一次控制器快照：时间、cwnd、RTT 估计与拥塞状态。
//! 只做收集与 JSON 序列化；绘图不在本 crate 内。

mod types;

pub use types::{TelemetryEvent, TelemetryEventKind, TelemetryLog};
