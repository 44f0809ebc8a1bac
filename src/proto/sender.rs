//! 发送引擎
//!
//! 单线程、同步的发送端状态机：
//! - 为每个载荷分配严格递增的 `packet_id`，编码为 `[8 位 id][payload]` 发出，并记入账本
//! - 有界等待 ACK：收到 ACK 则计算 RTT 样本并交给拥塞控制；超时则把最早未确认的包判为丢失
//! - 连续丢包跨度过长时判定持续拥塞
//! - 流结束发 `EOF`，会话关闭发 `END` 终止单元并释放传输资源（尽力而为，失败只记日志）
//!
//! 拥塞控制器与账本归单个会话独占，不存在全局状态。

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{ConfigError, SenderError};
use crate::net::transport::{RecvOutcome, Transport};
use crate::net::wire::{self, END_ID, ID_WIDTH, MAX_PACKET_ID};
use crate::proto::ledger::{PacketId, SentPacket, SentPacketLedger};
use crate::proto::newreno::{CongestionController, NewRenoConfig};
use crate::proto::persistent::{PERSISTENT_CONGESTION_THRESHOLD, PersistentCongestionDetector};
use crate::proto::report::{RoundReport, RttSample};
use crate::sim::{Clock, SimTime};
use crate::telemetry::{TelemetryEvent, TelemetryEventKind, TelemetryLog};

/// 默认 ACK 等待时长（毫秒）
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 750;

/// 载荷字符集（字母 + 数字）
const PAYLOAD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// 有界等待 ACK 的时长（毫秒）；启用 `adaptive_timeout` 时为上限
    pub ack_timeout_ms: u64,
    /// 以 RTO 作为等待时长，夹在 `[min_ack_timeout_ms, ack_timeout_ms]` 之间
    pub adaptive_timeout: bool,
    pub min_ack_timeout_ms: u64,
    /// 持续拥塞时长（毫秒）；`None` 表示 RTO × 3（需已有 RTT 样本）
    pub persistent_congestion_ms: Option<u64>,
    /// 超时丢包后是否以新 id 重传载荷
    pub retransmit: bool,
    /// 单个载荷最多重传次数
    pub max_retransmits: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            adaptive_timeout: false,
            min_ack_timeout_ms: 50,
            persistent_congestion_ms: None,
            retransmit: false,
            max_retransmits: 3,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid("ack_timeout_ms must be positive".into()));
        }
        if self.adaptive_timeout && self.min_ack_timeout_ms > self.ack_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "min_ack_timeout_ms ({}) exceeds ack_timeout_ms ({})",
                self.min_ack_timeout_ms, self.ack_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// 一次有界等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWait {
    Acknowledged { id: i64, time: SimTime },
    TimedOut,
}

/// [`SenderEngine::receive_ack`] 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked { id: PacketId, rtt: Duration },
    /// 未知 / 重复 / 哨兵 id：不改变任何状态
    Ignored { id: i64 },
    /// 超时：最早未确认的包被判为丢失
    Lost {
        id: PacketId,
        persistent: bool,
        retransmitted_as: Option<PacketId>,
    },
    /// 超时，但没有未确认的包
    Idle,
}

pub struct SenderEngine<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    cfg: SenderConfig,
    cc_cfg: NewRenoConfig,
    cc: CongestionController,
    ledger: SentPacketLedger,
    detector: PersistentCongestionDetector,
    /// 仅在启用重传时保留载荷
    payloads: BTreeMap<PacketId, Vec<u8>>,
    peer: Option<SocketAddr>,
    next_id: PacketId,
    round: u32,
    report: RoundReport,
    telemetry: TelemetryLog,
    closed: bool,
}

impl<T: Transport, C: Clock> SenderEngine<T, C> {
    pub fn new(
        transport: T,
        clock: C,
        cc_cfg: NewRenoConfig,
        cfg: SenderConfig,
    ) -> Result<Self, SenderError> {
        cc_cfg.validate()?;
        cfg.validate()?;
        let now = clock.now();
        Ok(Self {
            transport,
            clock,
            cc: CongestionController::new(cc_cfg.clone()),
            cc_cfg,
            cfg,
            ledger: SentPacketLedger::new(),
            detector: PersistentCongestionDetector::new(),
            payloads: BTreeMap::new(),
            peer: None,
            next_id: 1,
            round: 0,
            report: RoundReport::new(0, now),
            telemetry: TelemetryLog::default(),
            closed: false,
        })
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    fn ensure_open(&self) -> Result<(), SenderError> {
        if self.closed {
            return Err(SenderError::Closed);
        }
        Ok(())
    }

    /// 等待接收端的第一个报文（`CONNECT`）以获知其地址。
    pub fn accept_peer(&mut self, wait: Duration) -> Result<Option<SocketAddr>, SenderError> {
        self.ensure_open()?;
        match self.transport.recv_timeout(wait)? {
            RecvOutcome::Datagram { from, data } => {
                info!(peer = %from, bytes = data.len(), "接收端已连接");
                self.peer = Some(from);
                Ok(Some(from))
            }
            RecvOutcome::TimedOut => Ok(None),
        }
    }

    /// 发送一个载荷；不等待 ACK。
    pub fn send(&mut self, payload: &[u8]) -> Result<PacketId, SenderError> {
        self.ensure_open()?;
        self.transmit(payload, 0)
    }

    fn transmit(&mut self, payload: &[u8], retransmits: u32) -> Result<PacketId, SenderError> {
        let peer = self.peer.ok_or(SenderError::NoPeer)?;
        let id = self.next_id;
        if id > MAX_PACKET_ID {
            return Err(SenderError::IdSpaceExhausted { max: MAX_PACKET_ID });
        }
        let unit = wire::encode_data(id, payload);
        self.transport.send_to(&unit, peer)?;
        self.next_id += 1;
        self.cc.on_packet_sent(id);

        let now = self.clock.now();
        self.ledger.record(
            id,
            SentPacket {
                payload_size: payload.len() as u64,
                time_sent: now,
                retransmits,
            },
        );
        if self.cfg.retransmit {
            self.payloads.insert(id, payload.to_vec());
        }
        self.report.data_units_sent += 1;
        if retransmits > 0 {
            self.report.retransmissions += 1;
        }
        trace!(
            id,
            bytes = payload.len(),
            retransmits,
            inflight = self.ledger.bytes_in_flight(),
            cwnd = self.cc.congestion_window(),
            "发送数据单元"
        );
        Ok(id)
    }

    fn ack_wait(&self) -> Duration {
        if self.cfg.adaptive_timeout {
            let lo = Duration::from_millis(self.cfg.min_ack_timeout_ms);
            self.cc.rto().clamp(lo, self.cfg.ack_timeout())
        } else {
            self.cfg.ack_timeout()
        }
    }

    /// 有界等待一个 ACK。无法解析的报文被跳过，继续等待剩余时间。
    pub fn wait_for_ack(&mut self) -> Result<AckWait, SenderError> {
        self.ensure_open()?;
        let deadline = self.clock.now().saturating_add(self.ack_wait());
        loop {
            let remaining = deadline.saturating_since(self.clock.now());
            if remaining.is_zero() {
                return Ok(AckWait::TimedOut);
            }
            match self.transport.recv_timeout(remaining)? {
                RecvOutcome::TimedOut => return Ok(AckWait::TimedOut),
                RecvOutcome::Datagram { data, from } => match wire::decode_ack(&data) {
                    Ok(id) => {
                        return Ok(AckWait::Acknowledged {
                            id,
                            time: self.clock.now(),
                        });
                    }
                    Err(e) => {
                        debug!(%from, error = %e, "忽略无法解析的 ACK");
                    }
                },
            }
        }
    }

    /// 等待并处理一个 ACK 或一次超时。
    pub fn receive_ack(&mut self) -> Result<AckOutcome, SenderError> {
        match self.wait_for_ack()? {
            AckWait::Acknowledged { id, time } => Ok(self.on_ack_received(id, time)),
            AckWait::TimedOut => self.on_ack_timeout(),
        }
    }

    fn on_ack_received(&mut self, id: i64, now: SimTime) -> AckOutcome {
        let sent = u64::try_from(id)
            .ok()
            .and_then(|pid| self.ledger.remove(pid).map(|s| (pid, s)));
        let Some((pid, sent)) = sent else {
            self.report.ignored_acks += 1;
            trace!(id, "忽略未知或重复的 ACK");
            return AckOutcome::Ignored { id };
        };
        self.payloads.remove(&pid);

        let rtt = now.saturating_since(sent.time_sent);
        self.cc.on_ack(pid, sent.payload_size, rtt, now);
        self.detector.on_ack();

        let rtt_ms = rtt.as_secs_f64() * 1_000.0;
        self.report.acked += 1;
        self.report.bytes_delivered = self.report.bytes_delivered.saturating_add(sent.payload_size);
        self.report.rtt_samples.push(RttSample {
            packet_id: pid,
            t_ns: now.0,
            rtt_ms,
        });
        self.telemetry.push(TelemetryEvent::snapshot(
            now,
            &self.cc,
            TelemetryEventKind::Ack {
                packet_id: pid,
                rtt_ms,
            },
        ));
        debug!(
            id = pid,
            rtt_ms,
            cwnd = self.cc.congestion_window(),
            srtt_ms = self.cc.estimated_rtt_ms(),
            state = ?self.cc.get_congestion_state(),
            "收到 ACK"
        );
        AckOutcome::Acked { id: pid, rtt }
    }

    fn persistent_period(&self) -> Option<Duration> {
        match self.cfg.persistent_congestion_ms {
            Some(ms) => Some(Duration::from_millis(ms)),
            // 没有 RTT 样本之前 RTO 没有意义
            None => self
                .cc
                .rtt()
                .latest_ms()
                .map(|_| self.cc.rto() * PERSISTENT_CONGESTION_THRESHOLD),
        }
    }

    fn on_ack_timeout(&mut self) -> Result<AckOutcome, SenderError> {
        let now = self.clock.now();
        let Some((pid, sent)) = self.ledger.pop_oldest() else {
            trace!("等待超时，没有未确认的包");
            return Ok(AckOutcome::Idle);
        };

        let persistent = match self.persistent_period() {
            Some(period) => self.detector.on_lost(pid, sent.time_sent, period),
            None => false,
        };
        self.cc.on_loss(pid, sent.time_sent, now);
        if persistent {
            self.cc.on_persistent_congestion(now);
            self.report.persistent_congestion_events += 1;
        }
        self.report.lost += 1;

        let payload = self.payloads.remove(&pid);
        let retransmitted_as = match payload {
            Some(p) if self.cfg.retransmit && sent.retransmits < self.cfg.max_retransmits => {
                Some(self.transmit(&p, sent.retransmits + 1)?)
            }
            _ => None,
        };

        self.telemetry.push(TelemetryEvent::snapshot(
            now,
            &self.cc,
            TelemetryEventKind::Loss {
                packet_id: pid,
                persistent,
                retransmitted_as,
            },
        ));
        info!(
            id = pid,
            persistent,
            ?retransmitted_as,
            cwnd = self.cc.congestion_window(),
            ssthresh = self.cc.slow_start_threshold(),
            "ACK 超时：判定丢包"
        );
        Ok(AckOutcome::Lost {
            id: pid,
            persistent,
            retransmitted_as,
        })
    }

    /// 发送轮次开始单元
    pub fn start_round(&mut self) -> Result<(), SenderError> {
        self.ensure_open()?;
        let peer = self.peer.ok_or(SenderError::NoPeer)?;
        self.transport.send_to(&wire::encode_start(), peer)?;
        let now = self.clock.now();
        self.report.started_ns = now.0;
        self.telemetry.push(TelemetryEvent::snapshot(
            now,
            &self.cc,
            TelemetryEventKind::RoundStart { round: self.round },
        ));
        Ok(())
    }

    /// 发送 `EOF` 哨兵：本轮没有更多数据
    pub fn finish_stream(&mut self) -> Result<(), SenderError> {
        self.ensure_open()?;
        let peer = self.peer.ok_or(SenderError::NoPeer)?;
        self.transport.send_to(&wire::encode_eof(), peer)?;
        debug!(round = self.round, "已发送 EOF");
        Ok(())
    }

    /// 开始新一轮：全新的拥塞控制器与账本，丢弃 socket 中残留的报文。
    ///
    /// `packet_id` 不回绕，旧轮次迟到的 ACK 会被当作未知 id 忽略。
    pub fn reset_round(&mut self) -> Result<(), SenderError> {
        self.ensure_open()?;
        self.cc = CongestionController::new(self.cc_cfg.clone());
        self.ledger.clear();
        self.payloads.clear();
        self.detector = PersistentCongestionDetector::new();
        self.round += 1;
        self.report = RoundReport::new(self.round, self.clock.now());

        let mut drained = 0usize;
        while let RecvOutcome::Datagram { .. } = self.transport.recv_timeout(Duration::ZERO)? {
            drained += 1;
        }
        debug!(round = self.round, drained, "新一轮开始，已清空残留报文");
        Ok(())
    }

    /// 驱动一轮传输：在拥塞窗口允许的范围内发送，随后等待 ACK / 超时，直到
    /// `num_packets` 个载荷都被确认或判为丢失；最后发送 `EOF`。
    #[tracing::instrument(skip(self), fields(round = self.round))]
    pub fn simulate(&mut self, num_packets: u64) -> Result<RoundReport, SenderError> {
        self.ensure_open()?;
        self.start_round()?;
        let payload_len = (self.cc.mss() as usize).saturating_sub(ID_WIDTH).max(1);
        info!(num_packets, payload_len, "开始发送");

        let mut queued = 0u64;
        loop {
            while queued < num_packets && self.window_allows(payload_len) {
                queued += 1;
                let payload = make_payload(queued, payload_len);
                self.send(&payload)?;
            }
            if queued >= num_packets && self.ledger.is_empty() {
                break;
            }
            self.receive_ack()?;
        }
        self.finish_stream()?;

        let now = self.clock.now();
        self.report.finished_ns = Some(now.0);
        self.telemetry.push(TelemetryEvent::snapshot(
            now,
            &self.cc,
            TelemetryEventKind::RoundEnd {
                round: self.round,
                acked: self.report.acked,
                lost: self.report.lost,
            },
        ));
        info!(
            acked = self.report.acked,
            lost = self.report.lost,
            retransmissions = self.report.retransmissions,
            bytes = self.report.bytes_delivered,
            "传输完成"
        );
        Ok(self.report.clone())
    }

    fn window_allows(&self, len: usize) -> bool {
        self.ledger.is_empty()
            || self.ledger.bytes_in_flight().saturating_add(len as u64) <= self.cc.congestion_window()
    }

    /// 关闭会话：发送 `END` 终止单元，尽力等待接收端确认，然后释放传输资源。
    ///
    /// 幂等；过程中的任何失败只记录日志。
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(peer) = self.peer {
            match self.transport.send_to(&wire::encode_end(), peer) {
                Ok(()) => self.await_close_ack(),
                Err(e) => warn!(error = %e, "发送 END 失败"),
            }
        }
        if let Err(e) = self.transport.close() {
            warn!(error = %e, "释放传输资源失败");
        }
        self.ledger.clear();
        self.payloads.clear();
        info!(round = self.round, "会话已关闭");
    }

    fn await_close_ack(&mut self) {
        let deadline = self.clock.now().saturating_add(self.cfg.ack_timeout());
        loop {
            let remaining = deadline.saturating_since(self.clock.now());
            if remaining.is_zero() {
                warn!("等待 END 确认超时");
                return;
            }
            match self.transport.recv_timeout(remaining) {
                Ok(RecvOutcome::Datagram { data, .. }) => {
                    if wire::decode_ack(&data) == Ok(END_ID) {
                        debug!("收到 END 确认");
                        return;
                    }
                }
                Ok(RecvOutcome::TimedOut) => {
                    warn!("等待 END 确认超时");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "等待 END 确认失败");
                    return;
                }
            }
        }
    }

    pub fn controller(&self) -> &CongestionController {
        &self.cc
    }

    pub fn ledger(&self) -> &SentPacketLedger {
        &self.ledger
    }

    pub fn report(&self) -> &RoundReport {
        &self.report
    }

    pub fn telemetry(&self) -> &TelemetryLog {
        &self.telemetry
    }

    pub fn take_telemetry(&mut self) -> TelemetryLog {
        std::mem::take(&mut self.telemetry)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn next_packet_id(&self) -> PacketId {
        self.next_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// 第 `seq` 个载荷的内容（确定性，便于接收端校验）
pub fn make_payload(seq: u64, len: usize) -> Vec<u8> {
    let n = PAYLOAD_ALPHABET.len();
    let offset = (seq as usize).wrapping_mul(31);
    (0..len)
        .map(|i| PAYLOAD_ALPHABET[offset.wrapping_add(i) % n])
        .collect()
}
