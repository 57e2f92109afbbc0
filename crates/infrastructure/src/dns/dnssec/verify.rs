//! RRSIG and DS verification over canonicalized RRsets (RFC 4034/4035).

use super::types::{canonical_rdata_wire, name_to_wire, Dnskey, Ds, Rrsig};
use crate::dns::cache::{canonical_owner, group_rrsets, Rrset};
use hickory_proto::rr::{RData, Record, RecordType};
use ring::signature;
use rootward_domain::{DnsError, VerifyError};
use sha2::{Digest, Sha256, Sha384};
use tracing::{debug, warn};

/// DNSSEC algorithm numbers (RFC 8624).
mod algorithm {
    pub const RSASHA1: u8 = 5;
    pub const RSASHA1_NSEC3_SHA1: u8 = 7;
    pub const RSASHA256: u8 = 8;
    pub const RSASHA512: u8 = 10;
    pub const ECDSAP256SHA256: u8 = 13;
    pub const ECDSAP384SHA384: u8 = 14;
    pub const ED25519: u8 = 15;
}

/// DS digest type numbers (RFC 8624).
mod digest_type {
    pub const SHA256: u8 = 2;
    pub const SHA384: u8 = 4;
}

/// Outcome of validating one RRset against a zone's DNSKEY set.
#[derive(Clone, Debug)]
pub enum VerifiedRrset {
    /// At least one covering signature verified; `rrsigs` holds the rdatas
    /// of the signatures that did.
    Valid { rrset: Rrset, rrsigs: Vec<RData> },
    /// The RRset is canonical but no signature proved it. `sig_count` is the
    /// number of covering signatures that were considered and failed, zero
    /// for plain unsigned data.
    NotVerified { rrset: Rrset, sig_count: usize },
}

impl VerifiedRrset {
    pub fn rrset(&self) -> &Rrset {
        match self {
            VerifiedRrset::Valid { rrset, .. } => rrset,
            VerifiedRrset::NotVerified { rrset, .. } => rrset,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifiedRrset::Valid { .. })
    }

    /// Signed data was present but none of it verified.
    pub fn is_bogus(&self) -> bool {
        matches!(self, VerifiedRrset::NotVerified { sig_count, .. } if *sig_count > 0)
    }
}

/// Verify one RRSIG over already-reconstructed signed data.
pub fn verify_rrsig(
    dnskey: &Dnskey,
    rrsig: &Rrsig,
    signed_data: &[u8],
) -> Result<(), VerifyError> {
    if dnskey.algorithm != rrsig.algorithm {
        return Err(VerifyError::BadKeyData(
            "DNSKEY/RRSIG algorithm mismatch".to_string(),
        ));
    }
    let sig = rrsig.signature.as_slice();

    match rrsig.algorithm {
        algorithm::RSASHA1 | algorithm::RSASHA1_NSEC3_SHA1 => {
            verify_rsa(
                dnskey,
                signed_data,
                sig,
                &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
            )
        }
        algorithm::RSASHA256 => verify_rsa(
            dnskey,
            signed_data,
            sig,
            &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
        ),
        algorithm::RSASHA512 => verify_rsa(
            dnskey,
            signed_data,
            sig,
            &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
        ),
        algorithm::ECDSAP256SHA256 | algorithm::ECDSAP384SHA384 => {
            let alg: &dyn signature::VerificationAlgorithm =
                if rrsig.algorithm == algorithm::ECDSAP256SHA256 {
                    &signature::ECDSA_P256_SHA256_FIXED
                } else {
                    &signature::ECDSA_P384_SHA384_FIXED
                };
            // The verifier expects an uncompressed point, so restore the
            // 0x04 identifier the DNSKEY wire format strips.
            let mut key = Vec::with_capacity(dnskey.public_key.len() + 1);
            key.push(0x04);
            key.extend_from_slice(&dnskey.public_key);
            signature::UnparsedPublicKey::new(alg, &key)
                .verify(signed_data, sig)
                .map_err(|_| VerifyError::BadSignature)
        }
        algorithm::ED25519 => {
            signature::UnparsedPublicKey::new(&signature::ED25519, &dnskey.public_key)
                .verify(signed_data, sig)
                .map_err(|_| VerifyError::BadSignature)
        }
        other => Err(VerifyError::UnsupportedAlgorithm(other)),
    }
}

fn verify_rsa(
    dnskey: &Dnskey,
    signed_data: &[u8],
    sig: &[u8],
    alg: &'static signature::RsaParameters,
) -> Result<(), VerifyError> {
    let (e, n) = rsa_exponent_modulus(&dnskey.public_key)?;
    if n.len() < 1024 / 8 {
        return Err(VerifyError::BadKeyData(
            "RSA modulus shorter than 1024 bits".to_string(),
        ));
    }
    signature::RsaPublicKeyComponents { n, e }
        .verify(alg, signed_data, sig)
        .map_err(|_| VerifyError::BadSignature)
}

/// Split a DNSKEY RSA public key into exponent and modulus (RFC 3110).
fn rsa_exponent_modulus(public_key: &[u8]) -> Result<(&[u8], &[u8]), VerifyError> {
    if public_key.len() <= 3 {
        return Err(VerifyError::BadKeyData("RSA key too short".to_string()));
    }
    let (pos, exp_len) = match public_key[0] {
        0 => (
            3,
            (usize::from(public_key[1]) << 8) | usize::from(public_key[2]),
        ),
        len => (1, usize::from(len)),
    };
    if public_key.len() < pos + exp_len || exp_len == 0 {
        return Err(VerifyError::BadKeyData(
            "RSA exponent extends beyond key data".to_string(),
        ));
    }
    Ok(public_key[pos..].split_at(exp_len))
}

/// Recompute a DS digest from a DNSKEY and its owner and compare.
pub fn verify_ds(owner: &str, dnskey: &Dnskey, ds: &Ds) -> Result<(), VerifyError> {
    if dnskey.key_tag() != ds.key_tag || dnskey.algorithm != ds.algorithm {
        return Err(VerifyError::BadKeyData(
            "DS key tag or algorithm does not match DNSKEY".to_string(),
        ));
    }

    let mut data = name_to_wire(owner)
        .map_err(|e| VerifyError::BadKeyData(format!("DS owner name: {e}")))?;
    data.extend_from_slice(&dnskey.rdata_wire());

    let computed = match ds.digest_type {
        digest_type::SHA256 => {
            let mut hasher = Sha256::new();
            hasher.update(&data);
            hasher.finalize().to_vec()
        }
        digest_type::SHA384 => {
            let mut hasher = Sha384::new();
            hasher.update(&data);
            hasher.finalize().to_vec()
        }
        other => return Err(VerifyError::UnsupportedDigest(other)),
    };

    if computed == ds.digest {
        Ok(())
    } else {
        Err(VerifyError::BadSignature)
    }
}

/// DNSKEYs whose (key tag, algorithm) match some DS and whose DS digest
/// verifies. An empty result is a trust-chain break.
pub fn select_sep_dnskeys(dss: &[Ds], owner: &str, dnskeys: &[Dnskey]) -> Vec<Dnskey> {
    dnskeys
        .iter()
        .filter(|key| {
            dss.iter().any(|ds| {
                ds.key_tag == key.key_tag()
                    && ds.algorithm == key.algorithm
                    && verify_ds(owner, key, ds).is_ok()
            })
        })
        .cloned()
        .collect()
}

/// Reconstruct the RFC 4035 §5.3.2 signed data from raw canonical rdatas.
///
/// `rdatas_wire` need not be pre-sorted; canonical RRset order is applied
/// here. The owner is wildcard-contracted when the RRSIG label count calls
/// for it.
pub fn signed_data_raw(
    rrsig: &Rrsig,
    owner: &str,
    class: u16,
    rdatas_wire: &[Vec<u8>],
) -> Result<Vec<u8>, DnsError> {
    let mut data = rrsig.signed_prefix()?;

    let stripped = owner.strip_suffix('.').unwrap_or(owner);
    let owner_labels: Vec<&str> = if stripped.is_empty() {
        Vec::new()
    } else {
        stripped.split('.').collect()
    };
    let owner_wire = if usize::from(rrsig.labels) < owner_labels.len() {
        // Wildcard expansion: "*." plus the rightmost rrsig.labels labels.
        let keep = owner_labels.len() - usize::from(rrsig.labels);
        let mut suffix = owner_labels[keep..].join(".");
        suffix.push('.');
        let mut wire = vec![1, b'*'];
        wire.extend_from_slice(&name_to_wire(&suffix)?);
        wire
    } else {
        name_to_wire(owner)?
    };

    let rtype = rrsig.type_covered;
    let mut sorted: Vec<&Vec<u8>> = rdatas_wire.iter().collect();
    sorted.sort();

    for rdata in sorted {
        data.extend_from_slice(&owner_wire);
        data.extend_from_slice(&rtype.to_be_bytes());
        data.extend_from_slice(&class.to_be_bytes());
        data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
        let rdlen = u16::try_from(rdata.len())
            .map_err(|_| DnsError::DecodeError("rdata exceeds wire length field".to_string()))?;
        data.extend_from_slice(&rdlen.to_be_bytes());
        data.extend_from_slice(rdata);
    }
    Ok(data)
}

/// Signed data for a grouped RRset, canonicalizing each member rdata.
pub fn signed_data_for_rrset(rrsig: &Rrsig, rrset: &Rrset) -> Result<Vec<u8>, DnsError> {
    let rdatas: Vec<Vec<u8>> = rrset
        .rdatas
        .iter()
        .map(canonical_rdata_wire)
        .collect::<Result<_, _>>()?;
    signed_data_raw(rrsig, &rrset.name, u16::from(rrset.class), &rdatas)
}

/// Parse every DNSKEY owned by `owner` out of a record section.
pub fn dnskeys_in(records: &[Record], owner: &str) -> Vec<Dnskey> {
    parse_owned(records, owner, RecordType::DNSKEY, Dnskey::parse)
}

/// Parse every DS owned by `owner` out of a record section.
pub fn dss_in(records: &[Record], owner: &str) -> Vec<Ds> {
    parse_owned(records, owner, RecordType::DS, Ds::parse)
}

fn parse_owned<T>(
    records: &[Record],
    owner: &str,
    rtype: RecordType,
    parse: fn(&[u8]) -> Result<T, DnsError>,
) -> Vec<T> {
    records
        .iter()
        .filter(|r| r.record_type() == rtype && &*canonical_owner(r.name()) == owner)
        .filter_map(|r| {
            let wire = super::types::rdata_wire(r.data()).ok()?;
            match parse(&wire) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(owner = %owner, rtype = %rtype, error = %e, "dropping unparseable rdata");
                    None
                }
            }
        })
        .collect()
}

/// Covering RRSIGs for (`name`, `rtype`) signed by `zone`, paired with
/// their original rdata for later caching.
fn covering_rrsigs(
    records: &[Record],
    name: &str,
    rtype: RecordType,
    zone: &str,
) -> Vec<(Rrsig, RData)> {
    records
        .iter()
        .filter(|r| {
            r.record_type() == RecordType::RRSIG && &*canonical_owner(r.name()) == name
        })
        .filter_map(|r| {
            let wire = super::types::rdata_wire(r.data()).ok()?;
            Rrsig::parse(&wire).ok().map(|sig| (sig, r.data().clone()))
        })
        .filter(|(sig, _)| sig.type_covered == u16::from(rtype) && &*sig.signer == zone)
        .collect()
}

/// The central validator: select the RRset owned by `name` of type `rtype`
/// from `section`, gather its covering RRSIGs signed by `zone`, and attempt
/// verification against `keys`.
pub fn verify_rrset(
    keys: &[Dnskey],
    zone: &str,
    now: u64,
    section: &[Record],
    name: &str,
    rtype: RecordType,
) -> Result<VerifiedRrset, VerifyError> {
    let members: Vec<Record> = section
        .iter()
        .filter(|r| r.record_type() == rtype && &*canonical_owner(r.name()) == name)
        .cloned()
        .collect();
    if members.is_empty() {
        return Err(VerifyError::EmptyRrset);
    }

    let mut groups = group_rrsets(&members);
    let rrset = match groups.remove(0) {
        Ok(rrset) => rrset,
        Err(e) => return Err(VerifyError::NotCanonical(e.to_string())),
    };

    let rrsigs = covering_rrsigs(section, name, rtype, zone);
    let mut validated: Vec<RData> = Vec::new();

    for (sig, rdata) in &rrsigs {
        if !sig.is_time_valid(now) {
            debug!(
                name = %name,
                key_tag = sig.key_tag,
                "skipping RRSIG outside validity window"
            );
            continue;
        }
        let signed = match signed_data_for_rrset(sig, &rrset) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(name = %name, error = %e, "cannot reconstruct signed data");
                continue;
            }
        };
        let proven = keys
            .iter()
            .filter(|key| {
                key.is_zone_key()
                    && key.protocol == 3
                    && key.key_tag() == sig.key_tag
                    && key.algorithm == sig.algorithm
            })
            .any(|key| verify_rrsig(key, sig, &signed).is_ok());
        if proven {
            validated.push(rdata.clone());
        }
    }

    if validated.is_empty() {
        Ok(VerifiedRrset::NotVerified {
            rrset,
            sig_count: rrsigs.len(),
        })
    } else {
        Ok(VerifiedRrset::Valid {
            rrset,
            rrsigs: validated,
        })
    }
}
