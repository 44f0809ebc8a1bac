//! UDP NewReno 发送端
//!
//! 绑定本地端口，等待接收端 `CONNECT`，然后按轮次发送数据并输出统计。

use clap::Parser;
use quic_newreno::net::UdpTransport;
use quic_newreno::proto::SenderEngine;
use quic_newreno::sim::{SessionSpec, WallClock};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "newreno-sender", about = "UDP 发送端：NewReno 拥塞控制")]
struct Args {
    /// 会话配置 JSON；命令行参数覆盖其中的字段
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind_ip: IpAddr,

    /// 监听端口
    #[arg(long)]
    port: Option<u16>,

    /// 每轮发送的数据单元数
    #[arg(long)]
    num_packets: Option<u64>,

    /// 传输轮数
    #[arg(long)]
    rounds: Option<u32>,

    /// ACK 等待时长（毫秒）；自适应时为上限
    #[arg(long)]
    ack_timeout_ms: Option<u64>,

    /// ACK 等待时长跟随 RTO
    #[arg(long, default_value_t = false)]
    adaptive_timeout: bool,

    /// 自适应等待的下限（毫秒）
    #[arg(long)]
    min_ack_timeout_ms: Option<u64>,

    /// 持续拥塞时长（毫秒）；不填则为 3 × RTO
    #[arg(long)]
    persistent_congestion_ms: Option<u64>,

    /// 超时丢包后重传
    #[arg(long, default_value_t = false)]
    retransmit: bool,

    /// 等待接收端连接的最长时间（秒）；不填则一直等待
    #[arg(long)]
    connect_timeout_secs: Option<u64>,

    /// 输出遥测 JSON；不填则不生成
    #[arg(long)]
    telemetry_json: Option<PathBuf>,
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
        .init();

    let args = Args::parse();

    let mut spec = match &args.config {
        Some(path) => SessionSpec::load(path).expect("load session config"),
        None => SessionSpec::default(),
    };
    if let Some(port) = args.port {
        spec.port = port;
    }
    if let Some(n) = args.num_packets {
        spec.num_packets = n;
    }
    if let Some(r) = args.rounds {
        spec.rounds = r;
    }
    if let Some(ms) = args.ack_timeout_ms {
        spec.sender.ack_timeout_ms = ms;
    }
    if let Some(ms) = args.persistent_congestion_ms {
        spec.sender.persistent_congestion_ms = Some(ms);
    }
    if args.adaptive_timeout {
        spec.sender.adaptive_timeout = true;
    }
    if let Some(ms) = args.min_ack_timeout_ms {
        spec.sender.min_ack_timeout_ms = ms;
    }
    if args.retransmit {
        spec.sender.retransmit = true;
    }
    spec.validate().expect("invalid session config");

    let transport = UdpTransport::bind((args.bind_ip, spec.port)).expect("bind udp socket");
    let mut engine = SenderEngine::new(
        transport,
        WallClock::new(),
        spec.congestion.clone(),
        spec.sender.clone(),
    )
    .expect("create sender engine");

    info!(ip = %args.bind_ip, port = spec.port, "发送端等待接收端连接");
    let started = Instant::now();
    let peer = loop {
        if let Some(peer) = engine
            .accept_peer(Duration::from_secs(1))
            .expect("wait for receiver")
        {
            break peer;
        }
        if let Some(limit) = args.connect_timeout_secs {
            if started.elapsed() >= Duration::from_secs(limit) {
                eprintln!("no receiver connected within {limit}s");
                std::process::exit(1);
            }
        }
    };
    info!(%peer, "开始发送");

    for round in 0..spec.rounds {
        if round > 0 {
            engine.reset_round().expect("reset round");
        }
        let report = engine.simulate(spec.num_packets).expect("simulate round");
        println!(
            "round {}: sent={} acked={} lost={} retrans={} persistent={} bytes={} goodput_mbps={:?}",
            report.round,
            report.data_units_sent,
            report.acked,
            report.lost,
            report.retransmissions,
            report.persistent_congestion_events,
            report.bytes_delivered,
            report.goodput_mbps(),
        );
    }
    engine.close();

    if let Some(path) = args.telemetry_json {
        let json = engine
            .telemetry()
            .to_json_pretty()
            .expect("serialize telemetry");
        fs::write(&path, json).expect("write telemetry json");
        eprintln!("wrote telemetry to {}", path.display());
    }
}
