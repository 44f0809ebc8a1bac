//! UDP 接收端（网络条件模拟）
//!
//! 向发送端发送 `CONNECT`，随后对每个数据单元按概率丢弃或延迟后回 ACK；
//! 收到 `END` 终止单元时回确认并退出。

use clap::Parser;
use quic_newreno::net::{
    DelayRange, LinkConfig, ReceiverAction, ReceiverEmulator, RecvOutcome, Transport,
    UdpTransport, wire,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "newreno-receiver", about = "UDP 接收端：按概率丢包/延迟 ACK")]
struct Args {
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    sender_ip: IpAddr,

    #[arg(long, default_value_t = 8080)]
    sender_port: u16,

    /// 本地绑定端口（0 表示由系统分配）
    #[arg(long, default_value_t = 0)]
    bind_port: u16,

    /// 丢包概率 [0, 1]
    #[arg(long, default_value_t = 0.0)]
    loss_probability: f64,

    /// 未丢包时走长时延的概率 [0, 1]
    #[arg(long, default_value_t = 0.01)]
    extended_delay_probability: f64,

    /// 正常时延区间（毫秒）
    #[arg(long, default_value_t = 1.0)]
    delay_min_ms: f64,
    #[arg(long, default_value_t = 10.0)]
    delay_max_ms: f64,

    /// 长时延区间（毫秒）
    #[arg(long, default_value_t = 150.0)]
    extended_min_ms: f64,
    #[arg(long, default_value_t = 500.0)]
    extended_max_ms: f64,

    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// 多久收不到任何报文就退出（秒）
    #[arg(long, default_value_t = 5)]
    idle_timeout_secs: u64,
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
    let cfg = LinkConfig {
        loss_probability: args.loss_probability,
        extended_delay_probability: args.extended_delay_probability,
        normal_delay: DelayRange::new(args.delay_min_ms, args.delay_max_ms),
        extended_delay: DelayRange::new(args.extended_min_ms, args.extended_max_ms),
        seed: args.seed,
    };
    cfg.validate().expect("invalid link config");

    let sender = SocketAddr::new(args.sender_ip, args.sender_port);
    let bind_ip = match args.sender_ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
    };
    let mut transport = UdpTransport::bind((bind_ip, args.bind_port)).expect("bind udp socket");
    let mut emulator = ReceiverEmulator::new(cfg);

    info!(%sender, "连接发送端");
    transport
        .send_to(wire::CONNECT, sender)
        .expect("send CONNECT");

    let idle = Duration::from_secs(args.idle_timeout_secs);
    loop {
        let (data, from) = match transport.recv_timeout(idle) {
            Ok(RecvOutcome::Datagram { data, from }) => (data, from),
            Ok(RecvOutcome::TimedOut) => {
                warn!(?idle, "长时间未收到报文，退出");
                break;
            }
            Err(e) => {
                warn!(error = %e, "接收失败，退出");
                break;
            }
        };
        match emulator.on_unit(&data) {
            ReceiverAction::Ack { ack, delay } => {
                std::thread::sleep(delay);
                if let Err(e) = transport.send_to(&ack, from) {
                    warn!(error = %e, "发送 ACK 失败");
                }
            }
            ReceiverAction::Close { ack } => {
                if let Err(e) = transport.send_to(&ack, from) {
                    warn!(error = %e, "发送 END 确认失败");
                }
                info!("发送端结束会话");
                break;
            }
            ReceiverAction::Drop { .. } | ReceiverAction::Marker | ReceiverAction::Malformed => {}
        }
    }
    let _ = transport.close();

    let stats = emulator.stats();
    println!(
        "receiver: data_units={} delivered={} dropped={} extended_delays={} unique_received={}",
        stats.data_units,
        stats.delivered,
        stats.dropped,
        stats.extended_delays,
        emulator.received_count()
    );
}
