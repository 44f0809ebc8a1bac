//! 已发送、未确认包的账本
//!
//! `packet_id -> (payload_size, send_time)`。id 单调递增，因此最小 id 即最早发出的包。

use std::collections::BTreeMap;

use crate::sim::SimTime;

pub type PacketId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentPacket {
    pub payload_size: u64,
    pub time_sent: SimTime,
    /// 该载荷已被重传的次数（首次发送为 0）
    pub retransmits: u32,
}

#[derive(Debug, Default)]
pub struct SentPacketLedger {
    inflight: BTreeMap<PacketId, SentPacket>,
    bytes_in_flight: u64,
}

impl SentPacketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: PacketId, sent: SentPacket) {
        if let Some(old) = self.inflight.insert(id, sent) {
            self.bytes_in_flight = self.bytes_in_flight.saturating_sub(old.payload_size);
        }
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(sent.payload_size);
    }

    /// 移除并返回条目；未知 id 返回 `None`。
    pub fn remove(&mut self, id: PacketId) -> Option<SentPacket> {
        let sent = self.inflight.remove(&id)?;
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(sent.payload_size);
        Some(sent)
    }

    pub fn oldest(&self) -> Option<(PacketId, &SentPacket)> {
        self.inflight.iter().next().map(|(&id, s)| (id, s))
    }

    /// 移除并返回最早未确认的包
    pub fn pop_oldest(&mut self) -> Option<(PacketId, SentPacket)> {
        let (id, sent) = self.inflight.pop_first()?;
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(sent.payload_size);
        Some((id, sent))
    }

    pub fn get(&self, id: PacketId) -> Option<&SentPacket> {
        self.inflight.get(&id)
    }

    pub fn contains(&self, id: PacketId) -> bool {
        self.inflight.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    pub fn clear(&mut self) {
        self.inflight.clear();
        self.bytes_in_flight = 0;
    }
}
