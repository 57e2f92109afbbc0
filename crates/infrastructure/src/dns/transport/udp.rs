//! DNS over UDP with message-ID filtering on receive.

use super::{Proto, TransportResponse};
use bytes::Bytes;
use rootward_domain::DnsError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Largest response accepted over UDP with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Send one datagram and read until a response with the expected ID arrives
/// from the queried server, or the attempt deadline passes. Mismatched
/// datagrams are dropped without resending.
pub async fn exchange(
    server: SocketAddr,
    query: &[u8],
    expected_id: u16,
    timeout: Duration,
) -> Result<TransportResponse, DnsError> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| DnsError::NetworkFailure(format!("bind UDP socket: {e}")))?;

    let deadline = Instant::now() + timeout;

    tokio::time::timeout_at(deadline, socket.send_to(query, server))
        .await
        .map_err(|_| DnsError::TimeoutExpired)?
        .map_err(|e| DnsError::NetworkFailure(format!("send to {server}: {e}")))?;

    debug!(server = %server, bytes = query.len(), "UDP query sent");

    let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    loop {
        let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
            .await
            .map_err(|_| DnsError::TimeoutExpired)?
            .map_err(|e| DnsError::NetworkFailure(format!("recv from {server}: {e}")))?;

        if from.ip() != server.ip() {
            warn!(expected = %server, got = %from, "dropping response from unexpected source");
            continue;
        }
        if len < 2 {
            warn!(server = %server, len, "dropping undersized datagram");
            continue;
        }
        let id = u16::from_be_bytes([buf[0], buf[1]]);
        if id != expected_id {
            warn!(
                server = %server,
                expected = expected_id,
                got = id,
                "dropping response with mismatched ID"
            );
            continue;
        }

        debug!(server = %server, bytes = len, "UDP response received");
        return Ok(TransportResponse {
            bytes: Bytes::copy_from_slice(&buf[..len]),
            protocol: Proto::Udp,
        });
    }
}
