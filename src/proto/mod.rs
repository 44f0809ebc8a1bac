//! 发送端协议模块
//!
//! 包含 NewReno 拥塞控制、RTT 估计、已发送包账本与发送引擎。

pub mod ledger;
pub mod newreno;
pub mod persistent;
pub mod report;
pub mod rtt;
pub mod sender;

pub use ledger::{PacketId, SentPacket, SentPacketLedger};
pub use newreno::{CongestionController, CongestionState, NewRenoConfig};
pub use report::RoundReport;
pub use sender::{AckOutcome, AckWait, SenderConfig, SenderEngine};
