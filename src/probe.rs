//! UDP transport probe and round-trip timing
//!
//! Every probe opens its own socket, sends one datagram and waits for one
//! reply. Failures come back as `ProbeOutcome` values; nothing is retried.

use crate::models::{Endpoint, ProbeOutcome, ProbeRequest};
use async_trait::async_trait;
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::{Duration, Instant},
};
use tokio::{net::UdpSocket, time::timeout};

/// Transport abstraction for the load driver and the verifiers
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform a single request/reply exchange against `endpoint`
    async fn probe(&self, endpoint: &Endpoint, request: &ProbeRequest) -> ProbeOutcome;
}

/// Probe that talks to the endpoint over a fresh UDP socket per call.
///
/// By default the socket stays unconnected and the first datagram to arrive is
/// taken as the reply, whatever its source; multi-homed or NAT'd backends may
/// answer from another address than the one probed.
#[derive(Debug, Clone)]
pub struct UdpProber {
    recv_buffer_size: usize,
    connect: bool,
}

impl Default for UdpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpProber {
    pub fn new() -> Self {
        Self {
            recv_buffer_size: crate::defaults::MAX_DATAGRAM_SIZE,
            connect: false,
        }
    }

    /// Use a smaller receive buffer; longer replies are truncated by the OS
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.max(1);
        self
    }

    /// Connect the socket before sending.
    ///
    /// The kernel then reports ICMP port-unreachable as a transport error
    /// instead of a timeout, but drops replies from any other source address.
    pub fn with_connected_socket(mut self, connect: bool) -> Self {
        self.connect = connect;
        self
    }

    /// Resolve the endpoint to its first socket address.
    ///
    /// Resolution shares the request deadline so a hanging resolver cannot
    /// stall a worker forever.
    async fn resolve(endpoint: &Endpoint, deadline: Duration) -> std::result::Result<SocketAddr, String> {
        let target = endpoint.lookup_target();
        let lookup = timeout(deadline, tokio::net::lookup_host(target.clone()))
            .await
            .map_err(|_| format!("resolving {} timed out", endpoint.host()))?
            .map_err(|e| format!("resolving {}: {}", endpoint.host(), e))?;

        let mut addrs: Vec<SocketAddr> = lookup.collect();
        // Prefer IPv4 like the game clients do
        addrs.sort_by_key(|addr| !addr.is_ipv4());
        addrs
            .into_iter()
            .next()
            .ok_or_else(|| format!("{} resolved to no addresses", endpoint.host()))
    }

    fn unspecified_for(addr: &SocketAddr) -> SocketAddr {
        if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        }
    }
}

#[async_trait]
impl Prober for UdpProber {
    async fn probe(&self, endpoint: &Endpoint, request: &ProbeRequest) -> ProbeOutcome {
        let addr = match Self::resolve(endpoint, request.timeout).await {
            Ok(addr) => addr,
            Err(detail) => return ProbeOutcome::transport_error(detail),
        };

        // The socket is dropped, and therefore closed, on every return below
        let socket = match UdpSocket::bind(Self::unspecified_for(&addr)).await {
            Ok(socket) => socket,
            Err(e) => return ProbeOutcome::transport_error(format!("bind failed: {}", e)),
        };

        if self.connect {
            if let Err(e) = socket.connect(addr).await {
                return ProbeOutcome::transport_error(format!("connect to {} failed: {}", addr, e));
            }
        }

        let sent = if self.connect {
            socket.send(&request.payload).await
        } else {
            socket.send_to(&request.payload, addr).await
        };
        if let Err(e) = sent {
            return ProbeOutcome::transport_error(describe_io_error("send", &addr, &e));
        }
        let sent_at = Instant::now();

        let mut buffer = vec![0u8; self.recv_buffer_size];
        let received = timeout(request.timeout, async {
            if self.connect {
                socket.recv(&mut buffer).await
            } else {
                socket.recv_from(&mut buffer).await.map(|(len, _from)| len)
            }
        })
        .await;

        match received {
            Ok(Ok(len)) => {
                let latency = sent_at.elapsed();
                buffer.truncate(len);
                ProbeOutcome::success(buffer, latency)
            }
            Ok(Err(e)) => ProbeOutcome::transport_error(describe_io_error("recv", &addr, &e)),
            Err(_) => ProbeOutcome::timeout(sent_at.elapsed()),
        }
    }
}

/// Short diagnostic for a socket error
fn describe_io_error(op: &str, addr: &SocketAddr, error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            format!("{} to {}: destination unreachable ({})", op, addr, error)
        }
        _ => format!("{} to {} failed: {}", op, addr, error),
    }
}
