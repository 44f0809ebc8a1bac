//! 传输边界
//!
//! 发送引擎只依赖这里的最小接口：绑定、发送、有界等待接收、关闭。
//! 有界等待接收的超时是正常结果（[`RecvOutcome::TimedOut`]），而不是错误。

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// 单个 UDP 数据报的最大长度
pub const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    Datagram { data: Vec<u8>, from: SocketAddr },
    TimedOut,
}

pub trait Transport {
    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()>;

    /// 最多等待 `wait`；期间无数据报则返回 `TimedOut`。
    fn recv_timeout(&mut self, wait: Duration) -> io::Result<RecvOutcome>;

    /// 释放底层资源。重复调用应返回 `Ok(())`。
    fn close(&mut self) -> io::Result<()>;
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport closed")
}
