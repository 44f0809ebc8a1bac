//! 离线 NewReno 实验
//!
//! 发送引擎跑在虚拟时间的仿真链路上（接收端按概率丢包/延迟），不需要真实网络，
//! 同一种子下结果完全可复现。

use clap::Parser;
use quic_newreno::net::EmulatedLink;
use quic_newreno::proto::{RoundReport, SenderEngine};
use quic_newreno::sim::{ManualClock, SessionSpec};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "newreno-sim", about = "虚拟时间仿真：单流 NewReno 发送端 + 有损接收端")]
struct Args {
    /// 会话配置 JSON；命令行参数覆盖其中的字段
    #[arg(long)]
    config: Option<PathBuf>,

    /// 每轮发送的数据单元数
    #[arg(long)]
    num_packets: Option<u64>,

    /// 传输轮数
    #[arg(long)]
    rounds: Option<u32>,

    /// 接收端丢包概率 [0, 1]
    #[arg(long)]
    loss_probability: Option<f64>,

    /// 未丢包时走长时延的概率 [0, 1]
    #[arg(long)]
    extended_delay_probability: Option<f64>,

    /// 持续拥塞时长（毫秒）；不填则为 3 × RTO
    #[arg(long)]
    persistent_congestion_ms: Option<u64>,

    /// ACK 等待时长（毫秒）；自适应时为上限
    #[arg(long)]
    ack_timeout_ms: Option<u64>,

    /// ACK 等待时长跟随 RTO
    #[arg(long, default_value_t = false)]
    adaptive_timeout: bool,

    /// 自适应等待的下限（毫秒）
    #[arg(long)]
    min_ack_timeout_ms: Option<u64>,

    /// 超时丢包后重传
    #[arg(long, default_value_t = false)]
    retransmit: bool,

    /// 随机数种子
    #[arg(long)]
    seed: Option<u64>,

    /// 输出遥测 JSON（cwnd / RTT / 状态时间序列）；不填则不生成
    #[arg(long)]
    telemetry_json: Option<PathBuf>,

    /// 输出每轮统计 JSON；不填则不生成
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl Args {
    fn apply(&self, spec: &mut SessionSpec) {
        if let Some(n) = self.num_packets {
            spec.num_packets = n;
        }
        if let Some(r) = self.rounds {
            spec.rounds = r;
        }
        if let Some(p) = self.loss_probability {
            spec.link.loss_probability = p;
        }
        if let Some(p) = self.extended_delay_probability {
            spec.link.extended_delay_probability = p;
        }
        if let Some(ms) = self.persistent_congestion_ms {
            spec.sender.persistent_congestion_ms = Some(ms);
        }
        if let Some(ms) = self.ack_timeout_ms {
            spec.sender.ack_timeout_ms = ms;
        }
        if self.adaptive_timeout {
            spec.sender.adaptive_timeout = true;
        }
        if let Some(ms) = self.min_ack_timeout_ms {
            spec.sender.min_ack_timeout_ms = ms;
        }
        if self.retransmit {
            spec.sender.retransmit = true;
        }
        if let Some(seed) = self.seed {
            spec.link.seed = seed;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut spec = match &args.config {
        Some(path) => SessionSpec::load(path).expect("load session config"),
        None => SessionSpec::default(),
    };
    args.apply(&mut spec);
    spec.validate().expect("invalid session config");

    let clock = ManualClock::new();
    let link = EmulatedLink::new(spec.link.clone(), clock.clone());
    let mut engine = SenderEngine::new(link, clock, spec.congestion.clone(), spec.sender.clone())
        .expect("create sender engine");
    engine
        .accept_peer(Duration::ZERO)
        .expect("accept emulated receiver")
        .expect("emulated receiver connects at t=0");

    let mut reports: Vec<RoundReport> = Vec::with_capacity(spec.rounds as usize);
    for round in 0..spec.rounds {
        if round > 0 {
            engine.reset_round().expect("reset round");
        }
        let report = engine.simulate(spec.num_packets).expect("simulate round");
        let cc = engine.controller();
        println!(
            "round {}: sent={} acked={} lost={} retrans={} persistent={} bytes={} goodput_mbps={:?}\n  cc: cwnd_bytes={} ssthresh_bytes={} max_ssthresh_bytes={} srtt_ms={:.3} rttvar_ms={:.3} min_rtt_ms={:?} state={:?} loss_detected={}",
            report.round,
            report.data_units_sent,
            report.acked,
            report.lost,
            report.retransmissions,
            report.persistent_congestion_events,
            report.bytes_delivered,
            report.goodput_mbps(),
            cc.congestion_window(),
            cc.slow_start_threshold(),
            cc.max_slow_start_threshold(),
            cc.estimated_rtt_ms(),
            cc.rtt_deviation_ms(),
            cc.rtt().min_ms(),
            cc.get_congestion_state(),
            cc.loss_detected(),
        );
        reports.push(report);
    }

    let stats = engine.transport().stats();
    engine.close();
    println!(
        "link: units_sent={} data_units={} delivered={} dropped={} extended_delays={}",
        engine.transport().units_sent(),
        stats.data_units,
        stats.delivered,
        stats.dropped,
        stats.extended_delays
    );

    if let Some(path) = args.telemetry_json {
        let json = engine
            .take_telemetry()
            .to_json_pretty()
            .expect("serialize telemetry");
        fs::write(&path, json).expect("write telemetry json");
        eprintln!("wrote telemetry to {}", path.display());
    }
    if let Some(path) = args.report_json {
        let json = serde_json::to_string_pretty(&reports).expect("serialize reports");
        fs::write(&path, json).expect("write report json");
        eprintln!("wrote reports to {}", path.display());
    }
}
