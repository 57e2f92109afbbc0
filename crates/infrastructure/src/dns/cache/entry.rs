use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RData;
use rootward_domain::Ranking;
use std::sync::Arc;

/// A cached answer variant.
///
/// Positive entries carry the answer rdatas; a non-empty `rrsigs` list means
/// the RRset was DNSSEC-validated and those signatures proved it. Negative
/// entries either point at the SOA owner whose cached SOA supplies the
/// negative TTL, or are self-contained rcode failures.
#[derive(Clone, Debug)]
pub enum Hit {
    Positive {
        rdatas: Vec<RData>,
        rrsigs: Vec<RData>,
    },
    Negative {
        soa_owner: Arc<str>,
        rcode: ResponseCode,
    },
    NegativeNoSoa {
        rcode: ResponseCode,
    },
}

impl Hit {
    pub fn unverified(rdatas: Vec<RData>) -> Self {
        Hit::Positive {
            rdatas,
            rrsigs: Vec::new(),
        }
    }

    pub fn verified(rdatas: Vec<RData>, rrsigs: Vec<RData>) -> Self {
        Hit::Positive { rdatas, rrsigs }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Hit::Positive { .. })
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Hit::Positive { rrsigs, .. } if !rrsigs.is_empty())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Hit::Positive { rrsigs, .. } if !rrsigs.is_empty() => "positive-valid",
            Hit::Positive { .. } => "positive",
            Hit::Negative { .. } => "negative",
            Hit::NegativeNoSoa { .. } => "negative-no-soa",
        }
    }
}

/// A live cache entry: the hit, its trustworthiness rank, and the absolute
/// expiry in seconds since the epoch.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub hit: Hit,
    pub ranking: Ranking,
    pub expiry: u64,
    /// Insertion stamp used to invalidate stale sweep-heap nodes.
    pub(crate) stamp: u64,
}

impl CacheEntry {
    /// Remaining TTL, saturated into the unsigned 32-bit wire range.
    /// `None` once expired.
    pub fn ttl_remaining(&self, now: u64) -> Option<u32> {
        if self.expiry > now {
            Some(u32::try_from(self.expiry - now).unwrap_or(u32::MAX))
        } else {
            None
        }
    }
}
