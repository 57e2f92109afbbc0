//! A scripted network: `DnsExchange` backed by per-address handlers, so
//! engine tests drive the full resolution path hermetically.

#![allow(dead_code)]
#![allow(clippy::type_complexity)]

use super::wire::{build_response, ResponseFlags, WireRecord};
use async_trait::async_trait;
use bytes::Bytes;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use rootward_domain::DnsError;
use rootward_infrastructure::dns::transport::{DnsExchange, Proto, TransportResponse};
use rootward_infrastructure::dns::Clock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// IPv4 addresses of the compiled root hints; handlers registered here
/// catch the priming and first-step queries.
pub const ROOT_V4: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),
    Ipv4Addr::new(170, 247, 170, 2),
    Ipv4Addr::new(192, 33, 4, 12),
    Ipv4Addr::new(199, 7, 91, 13),
    Ipv4Addr::new(192, 203, 230, 10),
    Ipv4Addr::new(192, 5, 5, 241),
    Ipv4Addr::new(192, 112, 36, 4),
    Ipv4Addr::new(198, 97, 190, 53),
    Ipv4Addr::new(192, 36, 148, 17),
    Ipv4Addr::new(192, 58, 128, 30),
    Ipv4Addr::new(193, 0, 14, 129),
    Ipv4Addr::new(199, 7, 83, 42),
    Ipv4Addr::new(202, 12, 27, 33),
];

/// A canned response body; id and question are echoed by the mock.
#[derive(Clone, Default)]
pub struct Canned {
    pub flags: ResponseFlags,
    pub answers: Vec<WireRecord>,
    pub authority: Vec<WireRecord>,
    pub additional: Vec<WireRecord>,
}

pub type Handler = Box<dyn Fn(&str, u16, Proto) -> Option<Canned> + Send + Sync>;

#[derive(Default)]
pub struct MockNet {
    servers: HashMap<IpAddr, std::sync::Arc<Handler>>,
    exchanges: AtomicUsize,
}

impl MockNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(
        mut self,
        ip: Ipv4Addr,
        handler: impl Fn(&str, u16, Proto) -> Option<Canned> + Send + Sync + 'static,
    ) -> Self {
        self.servers
            .insert(IpAddr::V4(ip), std::sync::Arc::new(Box::new(handler)));
        self
    }

    /// Register one handler for all 13 root addresses.
    pub fn roots(
        mut self,
        handler: impl Fn(&str, u16, Proto) -> Option<Canned> + Send + Sync + 'static,
    ) -> Self {
        let shared: std::sync::Arc<Handler> = std::sync::Arc::new(Box::new(handler));
        for ip in ROOT_V4 {
            self.servers.insert(IpAddr::V4(ip), shared.clone());
        }
        self
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DnsExchange for MockNet {
    async fn exchange(
        &self,
        server: SocketAddr,
        proto: Proto,
        query: &[u8],
        expected_id: u16,
        _timeout: Duration,
    ) -> Result<TransportResponse, DnsError> {
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        let message =
            Message::from_vec(query).map_err(|e| DnsError::DecodeError(e.to_string()))?;
        let question = message.queries().first().ok_or(DnsError::FormatError)?;
        let mut qname = question.name().to_utf8().to_ascii_lowercase();
        if !qname.ends_with('.') {
            qname.push('.');
        }
        let qtype = u16::from(question.query_type());

        let handler = self.servers.get(&server.ip()).ok_or_else(|| {
            DnsError::NetworkFailure(format!("no scripted server at {}", server.ip()))
        })?;
        let canned = handler(&qname, qtype, proto).ok_or(DnsError::TimeoutExpired)?;

        let bytes = build_response(
            expected_id,
            &qname,
            qtype,
            canned.flags,
            &canned.answers,
            &canned.authority,
            &canned.additional,
        );
        Ok(TransportResponse {
            bytes: Bytes::from(bytes),
            protocol: proto,
        })
    }
}

/// Deterministic, manually advanced test clock.
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(start: u64) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self(AtomicU64::new(start)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn unix_now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub fn qtype_is(qtype: u16, rtype: RecordType) -> bool {
    qtype == u16::from(rtype)
}
