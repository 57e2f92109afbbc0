//! Root trust anchors: the compiled-in IANA root KSK DS set, optionally
//! overridden or extended by operator configuration.

use super::types::{Dnskey, Ds};
use super::verify::{select_sep_dnskeys, verify_ds};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rootward_domain::{DnsError, TrustAnchorEntry};
use tracing::debug;

/// Root KSK-2017 (key tag 20326), per the IANA trust anchor file.
const ROOT_DS_20326: (&str, u16) = (
    "E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D",
    20326,
);

/// Root KSK-2024 (key tag 38696), published for the upcoming rollover.
const ROOT_DS_38696: (&str, u16) = (
    "683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16",
    38696,
);

/// The trust anchor set the root priming step validates against.
#[derive(Clone, Debug, Default)]
pub struct TrustAnchors {
    dss: Vec<Ds>,
    /// Operator-prevalidated DNSKEYs trusted by direct comparison.
    keys: Vec<Dnskey>,
}

impl TrustAnchors {
    /// The compiled-in IANA root KSK DS set.
    pub fn compiled() -> Self {
        let ds = |entry: (&str, u16)| Ds {
            key_tag: entry.1,
            algorithm: 8,
            digest_type: 2,
            digest: hex_decode(entry.0).expect("compiled DS digest is valid hex"),
        };
        Self {
            dss: vec![ds(ROOT_DS_20326), ds(ROOT_DS_38696)],
            keys: Vec::new(),
        }
    }

    /// Build from operator configuration; an empty entry list means the
    /// compiled set.
    pub fn from_config(entries: &[TrustAnchorEntry]) -> Result<Self, DnsError> {
        if entries.is_empty() {
            return Ok(Self::compiled());
        }
        let mut anchors = Self::default();
        for entry in entries {
            match entry {
                TrustAnchorEntry::Ds {
                    key_tag,
                    algorithm,
                    digest_type,
                    digest,
                } => anchors.dss.push(Ds {
                    key_tag: *key_tag,
                    algorithm: *algorithm,
                    digest_type: *digest_type,
                    digest: hex_decode(digest).map_err(|e| {
                        DnsError::BadConfiguration(format!("trust anchor digest: {e}"))
                    })?,
                }),
                TrustAnchorEntry::Dnskey {
                    flags,
                    protocol,
                    algorithm,
                    public_key,
                } => anchors.keys.push(Dnskey {
                    flags: *flags,
                    protocol: *protocol,
                    algorithm: *algorithm,
                    public_key: STANDARD.decode(public_key).map_err(|e| {
                        DnsError::BadConfiguration(format!("trust anchor public key: {e}"))
                    })?,
                }),
            }
        }
        debug!(
            ds_anchors = anchors.dss.len(),
            key_anchors = anchors.keys.len(),
            "loaded operator trust anchors"
        );
        Ok(anchors)
    }

    /// DS records to seed the root delegation with.
    pub fn root_dss(&self) -> &[Ds] {
        &self.dss
    }

    /// Select the root DNSKEYs trusted by this anchor set: those whose DS
    /// digest verifies, plus exact matches of prevalidated keys.
    pub fn select_root_seps(&self, dnskeys: &[Dnskey]) -> Vec<Dnskey> {
        let mut seps = select_sep_dnskeys(&self.dss, ".", dnskeys);
        for key in dnskeys {
            if self.keys.contains(key) && !seps.contains(key) {
                seps.push(key.clone());
            }
        }
        seps
    }

    /// Whether a single DNSKEY is anchored here.
    pub fn trusts(&self, key: &Dnskey) -> bool {
        if self.keys.contains(key) {
            return true;
        }
        self.dss.iter().any(|ds| {
            ds.key_tag == key.key_tag()
                && ds.algorithm == key.algorithm
                && verify_ds(".", key, ds).is_ok()
        })
    }
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, DnsError> {
    if hex.len() % 2 != 0 {
        return Err(DnsError::DecodeError("odd-length hex string".to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| DnsError::DecodeError(format!("bad hex digit: {e}")))
        })
        .collect()
}
