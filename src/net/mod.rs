//! 网络模块
//!
//! 线路格式、传输边界（UDP / 虚拟时间仿真链路）以及接收端网络条件模拟。

pub mod emulator;
pub mod link;
pub mod transport;
pub mod udp;
pub mod wire;

pub use emulator::{DelayRange, LinkConfig, LinkStats, ReceiverAction, ReceiverEmulator, Verdict};
pub use link::EmulatedLink;
pub use transport::{RecvOutcome, Transport};
pub use udp::UdpTransport;
