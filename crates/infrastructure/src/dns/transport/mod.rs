//! Byte-level exchange with a single authoritative server.
//!
//! The trait is the engine's seam for tests: a scripted implementation can
//! stand in for the network while the norec client, the iterative walk and
//! the validator run unchanged.

pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use bytes::Bytes;
use rootward_domain::DnsError;
use std::net::SocketAddr;
use std::time::Duration;

/// Transport used for one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Proto {
    Udp,
    Tcp,
}

impl Proto {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proto::Udp => "UDP",
            Proto::Tcp => "TCP",
        }
    }
}

/// Raw response bytes plus the transport that produced them.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub bytes: Bytes,
    pub protocol: Proto,
}

#[async_trait]
pub trait DnsExchange: Send + Sync {
    /// Send one query and wait for the matching response. Implementations
    /// discard datagrams whose message ID differs from `expected_id` until
    /// the timeout expires; they never resend.
    async fn exchange(
        &self,
        server: SocketAddr,
        proto: Proto,
        query: &[u8],
        expected_id: u16,
        timeout: Duration,
    ) -> Result<TransportResponse, DnsError>;
}

/// The real network: UDP datagrams, TCP with the two-octet length prefix.
#[derive(Default)]
pub struct NetExchange;

#[async_trait]
impl DnsExchange for NetExchange {
    async fn exchange(
        &self,
        server: SocketAddr,
        proto: Proto,
        query: &[u8],
        expected_id: u16,
        timeout: Duration,
    ) -> Result<TransportResponse, DnsError> {
        match proto {
            Proto::Udp => udp::exchange(server, query, expected_id, timeout).await,
            Proto::Tcp => tcp::exchange(server, query, expected_id, timeout).await,
        }
    }
}
