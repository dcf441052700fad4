//! Loopback UDP fixtures shared by the integration tests

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{net::UdpSocket, task::JoinHandle};
use udp_routing_harness::Endpoint;

/// A UDP game server that tags every reply with its id
pub struct GameServer {
    pub addr: SocketAddr,
    pub id: String,
    handle: JoinHandle<()>,
}

impl GameServer {
    pub async fn spawn(id: &str) -> Self {
        Self::spawn_with_delay(id, Duration::ZERO).await
    }

    /// Every reply is held back by `delay`; requests are served concurrently
    pub async fn spawn_with_delay(id: &str, delay: Duration) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let server_id = id.to_string();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let request = String::from_utf8_lossy(&buf[..len]).to_string();
                let reply = game_reply(&server_id, &request);
                let socket = Arc::clone(&socket);
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = socket.send_to(reply.as_bytes(), from).await;
                });
            }
        });

        Self {
            addr,
            id: id.to_string(),
            handle,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        endpoint_for(self.addr)
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn game_reply(id: &str, request: &str) -> String {
    let request = request.trim();
    if request.starts_with("PING") {
        format!("PONG from server {} at 2024-05-01 10:00:00", id)
    } else if request.starts_with("BATTLE") {
        format!("BATTLE_RESPONSE from server {}: processed {}", id, request)
    } else if request.starts_with("STATUS") {
        format!("STATUS_RESPONSE from server {}: running", id)
    } else {
        format!("ECHO from server {}: {}", id, request)
    }
}

/// A round-robin UDP proxy in front of a set of backends
pub struct RoundRobinRouter {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RoundRobinRouter {
    pub async fn spawn(backends: Vec<SocketAddr>) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let next = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let Ok((len, client)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let datagram = buf[..len].to_vec();
                let backend = backends[next.fetch_add(1, Ordering::SeqCst) % backends.len()];
                let socket = Arc::clone(&socket);

                tokio::spawn(async move {
                    let Ok(upstream) = UdpSocket::bind("127.0.0.1:0").await else {
                        return;
                    };
                    if upstream.send_to(&datagram, backend).await.is_err() {
                        return;
                    }
                    let mut reply = vec![0u8; 2048];
                    if let Ok(Ok((n, _))) =
                        tokio::time::timeout(Duration::from_secs(2), upstream.recv_from(&mut reply)).await
                    {
                        let _ = socket.send_to(&reply[..n], client).await;
                    }
                });
            }
        });

        Self { addr, handle }
    }

    pub fn endpoint(&self) -> Endpoint {
        endpoint_for(self.addr)
    }
}

impl Drop for RoundRobinRouter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A bound socket that never answers; keep it alive for the duration of the test
pub async fn silent_endpoint() -> (UdpSocket, Endpoint) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let endpoint = endpoint_for(socket.local_addr().unwrap());
    (socket, endpoint)
}

pub fn endpoint_for(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port()).unwrap()
}
