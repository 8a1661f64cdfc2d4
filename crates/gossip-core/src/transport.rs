//! DatagramTransport trait for unreliable peer-to-peer delivery.
//!
//! Implementations:
//! - `UdpTransport`: tokio UDP socket (production)
//! - Tests drive the engine with an in-memory recording transport

use crate::error::NetworkError;
use crate::membership::PeerAddress;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Datagram transport used by the gossip engine.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Address the transport is actually bound to
    fn local_addr(&self) -> Result<SocketAddr, NetworkError>;

    /// Send one datagram to a peer's gossip endpoint
    async fn send_to(&self, target: &PeerAddress, data: &[u8]) -> Result<(), NetworkError>;

    /// Receive one datagram (blocks until data available)
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError>;
}

/// UDP transport over a single tokio socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `host:port`. Port 0 picks an ephemeral port.
    pub async fn bind(host: &str, port: u16) -> Result<Self, NetworkError> {
        let address = format!("{host}:{port}");
        let socket = UdpSocket::bind(&address)
            .await
            .map_err(|e| NetworkError::BindFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket
            .local_addr()
            .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))
    }

    async fn send_to(&self, target: &PeerAddress, data: &[u8]) -> Result<(), NetworkError> {
        let endpoint = target.gossip_endpoint();
        self.socket
            .send_to(data, endpoint.as_str())
            .await
            .map_err(|e| NetworkError::SendFailed {
                address: endpoint.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))
    }
}
