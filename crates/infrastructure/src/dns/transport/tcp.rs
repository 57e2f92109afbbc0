//! DNS over TCP: two-octet big-endian length prefix on both directions.

use super::{Proto, TransportResponse};
use bytes::Bytes;
use rootward_domain::DnsError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

pub async fn exchange(
    server: SocketAddr,
    query: &[u8],
    expected_id: u16,
    timeout: Duration,
) -> Result<TransportResponse, DnsError> {
    let deadline = Instant::now() + timeout;

    let mut stream = tokio::time::timeout_at(deadline, TcpStream::connect(server))
        .await
        .map_err(|_| DnsError::TimeoutExpired)?
        .map_err(|e| DnsError::NetworkFailure(format!("connect to {server}: {e}")))?;

    let len = u16::try_from(query.len())
        .map_err(|_| DnsError::FormatError)?
        .to_be_bytes();
    let mut framed = Vec::with_capacity(query.len() + 2);
    framed.extend_from_slice(&len);
    framed.extend_from_slice(query);

    tokio::time::timeout_at(deadline, stream.write_all(&framed))
        .await
        .map_err(|_| DnsError::TimeoutExpired)?
        .map_err(|e| DnsError::NetworkFailure(format!("write to {server}: {e}")))?;

    let mut len_buf = [0u8; 2];
    tokio::time::timeout_at(deadline, stream.read_exact(&mut len_buf))
        .await
        .map_err(|_| DnsError::TimeoutExpired)?
        .map_err(|e| DnsError::NetworkFailure(format!("read length from {server}: {e}")))?;

    let response_len = usize::from(u16::from_be_bytes(len_buf));
    let mut response = vec![0u8; response_len];
    tokio::time::timeout_at(deadline, stream.read_exact(&mut response))
        .await
        .map_err(|_| DnsError::TimeoutExpired)?
        .map_err(|e| DnsError::NetworkFailure(format!("read body from {server}: {e}")))?;

    if response_len < 2 {
        return Err(DnsError::FormatError);
    }
    let id = u16::from_be_bytes([response[0], response[1]]);
    if id != expected_id {
        return Err(DnsError::SequenceNumberMismatch);
    }

    debug!(server = %server, bytes = response_len, "TCP response received");
    Ok(TransportResponse {
        bytes: Bytes::from(response),
        protocol: Proto::Tcp,
    })
}
