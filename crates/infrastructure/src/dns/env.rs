//! Process-wide shared state for the resolver: cache handle, clock, query-ID
//! generator, trust anchors, transport, and the root-delegation cell.

use crate::dns::cache::RankedCache;
use crate::dns::delegation::Delegation;
use crate::dns::dnssec::TrustAnchors;
use crate::dns::transport::{DnsExchange, NetExchange};
use ring::rand::{SecureRandom, SystemRandom};
use rootward_domain::{DnsError, ResolverConfig};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Seconds-since-epoch clock, injectable so cache and signature-window
/// behavior is testable.
pub trait Clock: Send + Sync {
    fn unix_now(&self) -> u64;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// CSPRNG-backed 16-bit message-ID generator. Thread-safe; every caller
/// draws from the shared system source.
pub struct QueryIdGen {
    rng: SystemRandom,
}

impl QueryIdGen {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    pub fn next(&self) -> u16 {
        let mut bytes = [0u8; 2];
        match self.rng.fill(&mut bytes) {
            Ok(()) => u16::from_be_bytes(bytes),
            Err(_) => {
                warn!("system RNG unavailable, falling back to non-crypto IDs");
                fastrand::u16(..)
            }
        }
    }
}

impl Default for QueryIdGen {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ResolverEnv {
    pub config: ResolverConfig,
    pub cache: Arc<RankedCache>,
    pub clock: Arc<dyn Clock>,
    pub exchange: Arc<dyn DnsExchange>,
    pub anchors: TrustAnchors,
    ids: QueryIdGen,
    root: RwLock<Option<Arc<Delegation>>>,
}

impl ResolverEnv {
    /// Standard wiring: system clock, real network, cache sized from
    /// configuration.
    pub fn new(config: ResolverConfig) -> Result<Self, DnsError> {
        let cache = Arc::new(RankedCache::new(config.cache_size));
        Self::with_parts(config, cache, Arc::new(SystemClock), Arc::new(NetExchange))
    }

    /// Test wiring with explicit collaborators.
    pub fn with_parts(
        config: ResolverConfig,
        cache: Arc<RankedCache>,
        clock: Arc<dyn Clock>,
        exchange: Arc<dyn DnsExchange>,
    ) -> Result<Self, DnsError> {
        let anchors = TrustAnchors::from_config(&config.root_trust_anchors)?;
        Ok(Self {
            config,
            cache,
            clock,
            exchange,
            anchors,
            ids: QueryIdGen::new(),
            root: RwLock::new(None),
        })
    }

    pub fn now(&self) -> u64 {
        self.clock.unix_now()
    }

    pub fn next_id(&self) -> u16 {
        self.ids.next()
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.config.query_timeout_ms)
    }

    /// Read the root-delegation cell.
    pub fn root_delegation(&self) -> Option<Arc<Delegation>> {
        self.root
            .read()
            .expect("root cell lock poisoned")
            .as_ref()
            .cloned()
    }

    /// Swap in a freshly primed root delegation.
    pub fn set_root_delegation(&self, delegation: Arc<Delegation>) {
        *self.root.write().expect("root cell lock poisoned") = Some(delegation);
    }
}
