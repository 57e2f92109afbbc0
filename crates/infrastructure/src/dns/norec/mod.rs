//! The norec client: one non-recursive question to a set of authoritative
//! servers, with UDP retries and TCP fallback on truncation.

pub mod message;

use crate::dns::env::ResolverEnv;
use crate::dns::transport::Proto;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use message::{build_query, check_response, rcode_error};
use rootward_domain::DnsError;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

/// UDP attempts per server before giving up on it.
const UDP_ATTEMPTS: usize = 3;

/// A response that passed ID and question checks.
#[derive(Clone, Debug)]
pub struct NorecReply {
    pub message: Message,
    pub protocol: Proto,
    pub request_bytes: usize,
    pub response_bytes: usize,
}

/// Query each server in the supplied order until one yields a response that
/// passes the sanity checks. The caller pre-randomizes the order. Uses the
/// configured EDNS payload size; front-end overrides go through
/// [`norec_with_payload`].
pub async fn norec(
    env: &ResolverEnv,
    dnssec_ok: bool,
    servers: &[IpAddr],
    qname: &str,
    rtype: RecordType,
) -> Result<NorecReply, DnsError> {
    norec_with_payload(
        env,
        dnssec_ok,
        env.config.udp_payload_size,
        servers,
        qname,
        rtype,
    )
    .await
}

/// [`norec`] with an explicit EDNS UDP payload size.
pub async fn norec_with_payload(
    env: &ResolverEnv,
    dnssec_ok: bool,
    udp_payload: u16,
    servers: &[IpAddr],
    qname: &str,
    rtype: RecordType,
) -> Result<NorecReply, DnsError> {
    if servers.is_empty() {
        return Err(DnsError::ServerFailure(format!(
            "no reachable name-server addresses for {qname}"
        )));
    }

    let mut last_err = DnsError::RetryLimitExceeded;
    for server in servers {
        let addr = SocketAddr::new(*server, 53);
        match norec_one(env, dnssec_ok, udp_payload, addr, qname, rtype).await {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                warn!(server = %addr, qname = %qname, rtype = %rtype, error = %e, "norec attempt failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

async fn norec_one(
    env: &ResolverEnv,
    dnssec_ok: bool,
    udp_payload: u16,
    addr: SocketAddr,
    qname: &str,
    rtype: RecordType,
) -> Result<NorecReply, DnsError> {
    let mut last_err = DnsError::RetryLimitExceeded;

    for attempt in 0..UDP_ATTEMPTS {
        let id = env.next_id();
        let (query, bytes) = build_query(id, qname, rtype, dnssec_ok, udp_payload)?;

        let response = match env
            .exchange
            .exchange(addr, Proto::Udp, &bytes, id, env.attempt_timeout())
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                debug!(server = %addr, attempt, error = %e, "retrying UDP attempt");
                last_err = e;
                continue;
            }
            Err(e) => return Err(e),
        };

        let message = Message::from_vec(&response.bytes)
            .map_err(|e| DnsError::DecodeError(e.to_string()))?;
        check_response(&query, &message)?;

        // Truncated answers and EDNS-unaware FORMERRs both mean: ask again
        // over TCP, fresh ID, same server.
        if message.truncated() || message.response_code() == ResponseCode::FormErr {
            debug!(
                server = %addr,
                truncated = message.truncated(),
                "falling back to TCP"
            );
            return tcp_query(env, dnssec_ok, udp_payload, addr, qname, rtype).await;
        }

        if let Some(err) = rcode_error(message.response_code()) {
            return Err(err);
        }
        return Ok(NorecReply {
            message,
            protocol: response.protocol,
            request_bytes: bytes.len(),
            response_bytes: response.bytes.len(),
        });
    }
    Err(last_err)
}

async fn tcp_query(
    env: &ResolverEnv,
    dnssec_ok: bool,
    udp_payload: u16,
    addr: SocketAddr,
    qname: &str,
    rtype: RecordType,
) -> Result<NorecReply, DnsError> {
    let id = env.next_id();
    let (query, bytes) = build_query(id, qname, rtype, dnssec_ok, udp_payload)?;

    let response = env
        .exchange
        .exchange(addr, Proto::Tcp, &bytes, id, env.attempt_timeout())
        .await?;

    let message =
        Message::from_vec(&response.bytes).map_err(|e| DnsError::DecodeError(e.to_string()))?;
    check_response(&query, &message)?;
    if let Some(err) = rcode_error(message.response_code()) {
        return Err(err);
    }
    Ok(NorecReply {
        message,
        protocol: response.protocol,
        request_bytes: bytes.len(),
        response_bytes: response.bytes.len(),
    })
}
