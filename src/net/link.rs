//! 虚拟时间的仿真链路
//!
//! [`EmulatedLink`] 实现 [`Transport`]：发送的单元交给 [`ReceiverEmulator`] 决策，
//! 产生的 ACK 按“到达时间”放入最小堆；`recv_timeout` 把共享的 [`ManualClock`]
//! 推进到下一个 ACK 到达时刻或等待截止时刻。整个过程没有真实 sleep，且可复现。

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tracing::trace;

use super::emulator::{LinkConfig, LinkStats, ReceiverAction, ReceiverEmulator};
use super::transport::{RecvOutcome, Transport, closed_error};
use super::wire;
use crate::sim::{Clock, ManualClock, SimTime};

pub const SENDER_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080));
pub const RECEIVER_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9090));

/// 待投递给发送端的数据报
struct PendingDatagram {
    at: SimTime,
    seq: u64,
    data: Vec<u8>,
}

// BinaryHeap 是 max-heap；我们需要最早到达优先，因此反向比较。
impl Ord for PendingDatagram {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.at.cmp(&other.at) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for PendingDatagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingDatagram {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for PendingDatagram {}

pub struct EmulatedLink {
    clock: ManualClock,
    receiver: ReceiverEmulator,
    pending: BinaryHeap<PendingDatagram>,
    next_seq: u64,
    closed: bool,
    units_sent: u64,
}

impl EmulatedLink {
    /// 创建链路；接收端的 `CONNECT` 报文在 t=0 已经到达。
    pub fn new(cfg: LinkConfig, clock: ManualClock) -> Self {
        let mut link = Self {
            clock,
            receiver: ReceiverEmulator::new(cfg),
            pending: BinaryHeap::new(),
            next_seq: 0,
            closed: false,
            units_sent: 0,
        };
        let now = link.clock.now();
        link.push(now, wire::CONNECT.to_vec());
        link
    }

    fn push(&mut self, at: SimTime, data: Vec<u8>) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.pending.push(PendingDatagram { at, seq, data });
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn peer_addr(&self) -> SocketAddr {
        RECEIVER_ADDR
    }

    pub fn receiver(&self) -> &ReceiverEmulator {
        &self.receiver
    }

    pub fn stats(&self) -> LinkStats {
        self.receiver.stats()
    }

    pub fn units_sent(&self) -> u64 {
        self.units_sent
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Transport for EmulatedLink {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(SENDER_ADDR)
    }

    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.units_sent += 1;
        if to != RECEIVER_ADDR {
            trace!(?to, "目的地址不是仿真接收端，报文被丢弃");
            return Ok(());
        }
        let now = self.clock.now();
        match self.receiver.on_unit(data) {
            ReceiverAction::Ack { ack, delay } => self.push(now.saturating_add(delay), ack),
            ReceiverAction::Close { ack } => self.push(now, ack),
            ReceiverAction::Drop { .. } | ReceiverAction::Marker | ReceiverAction::Malformed => {}
        }
        Ok(())
    }

    fn recv_timeout(&mut self, wait: Duration) -> io::Result<RecvOutcome> {
        if self.closed {
            return Err(closed_error());
        }
        let deadline = self.clock.now().saturating_add(wait);
        let due = self.pending.peek().is_some_and(|top| top.at <= deadline);
        if !due {
            self.clock.advance_to(deadline);
            return Ok(RecvOutcome::TimedOut);
        }
        let Some(item) = self.pending.pop() else {
            self.clock.advance_to(deadline);
            return Ok(RecvOutcome::TimedOut);
        };
        self.clock.advance_to(item.at);
        Ok(RecvOutcome::Datagram {
            data: item.data,
            from: RECEIVER_ADDR,
        })
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}
