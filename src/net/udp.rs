//! 基于 `std::net::UdpSocket` 的阻塞式传输

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::debug;

use super::transport::{MAX_DATAGRAM, RecvOutcome, Transport, closed_error};

/// `set_read_timeout` 不接受 0，等待时间至少取这个值
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    buf: Vec<u8>,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        debug!(local = ?socket.local_addr().ok(), "udp 已绑定");
        Ok(Self {
            socket: Some(socket),
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    fn socket(&self) -> io::Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(closed_error)
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

impl Transport for UdpTransport {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket()?.local_addr()
    }

    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket()?.send_to(data, to)?;
        Ok(())
    }

    fn recv_timeout(&mut self, wait: Duration) -> io::Result<RecvOutcome> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(closed_error());
        };
        socket.set_read_timeout(Some(wait.max(MIN_READ_TIMEOUT)))?;
        match socket.recv_from(&mut self.buf) {
            Ok((n, from)) => Ok(RecvOutcome::Datagram {
                data: self.buf[..n].to_vec(),
                from,
            }),
            // 超时在 unix 上表现为 WouldBlock，在 windows 上为 TimedOut
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(RecvOutcome::TimedOut)
            }
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(socket) = self.socket.take() {
            debug!(local = ?socket.local_addr().ok(), "udp 已关闭");
        }
        Ok(())
    }
}
