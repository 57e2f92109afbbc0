use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use rootward_domain::DnsError;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportTag {
    Udp,
    Tcp,
    /// Served from the record cache without network I/O.
    Cache,
}

impl TransportTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportTag::Udp => "UDP",
            TransportTag::Tcp => "TCP",
            TransportTag::Cache => "cache",
        }
    }
}

/// Per-query flag and EDNS overrides supplied by the front-end.
#[derive(Debug, Clone)]
pub struct QueryControls {
    /// Echoed RD flag.
    pub rd: bool,
    /// Checking-disabled: skip DNSSEC validation outcomes for this client.
    pub cd: bool,
    /// Request the DO bit regardless of the configured default.
    pub dnssec_ok: Option<bool>,
    /// EDNS UDP payload override.
    pub udp_size: Option<u16>,
}

impl Default for QueryControls {
    fn default() -> Self {
        Self {
            rd: true,
            cd: false,
            dnssec_ok: None,
            udp_size: None,
        }
    }
}

/// A finished resolution handed back to the front-end.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message: Message,
    pub transport: TransportTag,
    pub request_bytes: usize,
    pub response_bytes: usize,
}

/// The resolution engine as seen by transport front-ends.
#[async_trait]
pub trait ResolverPort: Send + Sync {
    async fn resolve(
        &self,
        qname: &str,
        rtype: RecordType,
        controls: &QueryControls,
    ) -> Result<Reply, DnsError>;
}
