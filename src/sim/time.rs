//! 会话时间类型
//!
//! 定义会话时间（相对会话起点）及其单位转换。

use std::time::Duration;

/// 会话时间（纳秒，相对会话起点）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_millis(ms: u64) -> SimTime {
        SimTime(ms.saturating_mul(1_000_000))
    }

    pub fn from_duration(d: Duration) -> SimTime {
        SimTime(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// `self + d`（饱和）
    pub fn saturating_add(self, d: Duration) -> SimTime {
        SimTime(self.0.saturating_add(SimTime::from_duration(d).0))
    }

    /// `self - earlier`；若 `earlier` 更晚则为 0
    pub fn saturating_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}
