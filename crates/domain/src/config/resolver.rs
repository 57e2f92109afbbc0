use serde::{Deserialize, Serialize};

/// An operator-supplied root trust anchor, either a DS digest or a full
/// DNSKEY. Key material stays encoded here; the validator decodes it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrustAnchorEntry {
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        /// Hex-encoded digest, as published by IANA.
        digest: String,
    },
    Dnskey {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        /// Base64-encoded public key, zone-file style.
        public_key: String,
    },
}

/// Resolution engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Maximum number of cache entries. Zero disables caching entirely.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Upper bound applied to negative-entry TTLs (RFC 2308 cap).
    #[serde(default = "default_negative_min_ttl_cap")]
    pub negative_min_ttl_cap: u32,

    /// Skip IPv6 name-server addresses when selecting targets.
    #[serde(default = "default_false")]
    pub disable_v6_ns: bool,

    /// Request DNSSEC records (DO bit) by default.
    #[serde(default = "default_true")]
    pub dnssec_ok_default: bool,

    /// Per-attempt transport timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// EDNS0 advertised UDP payload size.
    #[serde(default = "default_udp_payload_size")]
    pub udp_payload_size: u16,

    /// Override of the compiled-in root trust anchor set. Empty means use
    /// the built-in root DS.
    #[serde(default)]
    pub root_trust_anchors: Vec<TrustAnchorEntry>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            negative_min_ttl_cap: default_negative_min_ttl_cap(),
            disable_v6_ns: false,
            dnssec_ok_default: true,
            query_timeout_ms: default_query_timeout_ms(),
            udp_payload_size: default_udp_payload_size(),
            root_trust_anchors: Vec::new(),
        }
    }
}

fn default_cache_size() -> usize {
    2048
}

fn default_negative_min_ttl_cap() -> u32 {
    1800
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_udp_payload_size() -> u16 {
    1232
}
