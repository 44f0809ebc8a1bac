//! 时钟
//!
//! 发送引擎只通过 [`Clock`] 读取“当前时间”：
//! - [`WallClock`]：真实 UDP 会话，单调时钟；
//! - [`ManualClock`]：虚拟时间，由仿真链路/测试推进，保证可复现。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::time::SimTime;

pub trait Clock {
    fn now(&self) -> SimTime;
}

/// 以创建时刻为起点的单调时钟。
#[derive(Debug, Clone)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> SimTime {
        SimTime::from_duration(self.epoch.elapsed())
    }
}

/// 共享的虚拟时钟：clone 出来的句柄看到同一时间。
///
/// 时间只前进不后退（`advance_to` 传入更早的时间会被忽略）。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        let step = SimTime::from_duration(d).0;
        let _ = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(step)));
    }

    pub fn advance_to(&self, t: SimTime) {
        self.now_ns.fetch_max(t.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimTime {
        SimTime(self.now_ns.load(Ordering::SeqCst))
    }
}
