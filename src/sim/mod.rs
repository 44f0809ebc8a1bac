//! 时间与会话配置
//!
//! 此模块包含会话时间、时钟抽象以及 JSON 会话配置。

// 子模块声明
mod clock;
mod session;
mod time;

// 重新导出公共接口
pub use clock::{Clock, ManualClock, WallClock};
pub use session::{DEFAULT_NUM_PACKETS, DEFAULT_PORT, SessionSpec};
pub use time::SimTime;
