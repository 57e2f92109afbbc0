//! DNSSEC record data: DNSKEY, DS and RRSIG carried as owned structs.
//!
//! The structs are parsed from raw rdata wire bytes obtained by re-emitting
//! the codec's rdata value, so the core works the same whether the codec
//! decoded the record into a typed variant or an opaque one. Names embedded
//! in DNSSEC rdata are never compressed, which keeps the parsers simple.

use hickory_proto::rr::RData;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use rootward_domain::DnsError;
use std::sync::Arc;

/// DNSKEY flag bit: zone key.
const FLAG_ZONE_KEY: u16 = 0x0100;
/// DNSKEY flag bit: secure entry point.
const FLAG_SEP: u16 = 0x0001;

/// Wire bytes of an rdata value, as the codec would emit them.
pub fn rdata_wire(rdata: &RData) -> Result<Vec<u8>, DnsError> {
    let mut buf = Vec::with_capacity(128);
    let mut encoder = BinEncoder::new(&mut buf);
    rdata
        .emit(&mut encoder)
        .map_err(|e| DnsError::DecodeError(format!("rdata re-emit failed: {e}")))?;
    Ok(buf)
}

/// Wire bytes of an rdata value in RFC 4034 canonical form: embedded names
/// lowercased and uncompressed.
pub fn canonical_rdata_wire(rdata: &RData) -> Result<Vec<u8>, DnsError> {
    let mut buf = Vec::with_capacity(128);
    let mut encoder = BinEncoder::new(&mut buf);
    encoder.set_canonical_names(true);
    rdata
        .emit(&mut encoder)
        .map_err(|e| DnsError::DecodeError(format!("canonical rdata emit failed: {e}")))?;
    Ok(buf)
}

/// Canonical (lowercase) wire form of a canonical string name.
pub fn name_to_wire(name: &str) -> Result<Vec<u8>, DnsError> {
    let stripped = name.strip_suffix('.').unwrap_or(name);
    let mut wire = Vec::with_capacity(stripped.len() + 2);
    if !stripped.is_empty() {
        for label in stripped.split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(DnsError::IllegalDomain(name.to_string()));
            }
            wire.push(label.len() as u8);
            wire.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        }
    }
    wire.push(0);
    Ok(wire)
}

/// Read an uncompressed wire name starting at `pos`, returning the canonical
/// string form and the position past the name.
fn read_name(bytes: &[u8], mut pos: usize) -> Result<(Arc<str>, usize), DnsError> {
    let mut labels: Vec<String> = Vec::new();
    loop {
        let len = *bytes
            .get(pos)
            .ok_or_else(|| DnsError::DecodeError("truncated name".to_string()))?
            as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len & 0xC0 != 0 {
            return Err(DnsError::DecodeError(
                "compressed name inside DNSSEC rdata".to_string(),
            ));
        }
        let label = bytes
            .get(pos..pos + len)
            .ok_or_else(|| DnsError::DecodeError("truncated label".to_string()))?;
        labels.push(
            label
                .iter()
                .map(|b| b.to_ascii_lowercase() as char)
                .collect(),
        );
        pos += len;
    }
    let mut name = labels.join(".");
    name.push('.');
    Ok((Arc::from(name), pos))
}

fn take_u16(bytes: &[u8], pos: usize) -> Result<u16, DnsError> {
    bytes
        .get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| DnsError::DecodeError("truncated u16".to_string()))
}

fn take_u32(bytes: &[u8], pos: usize) -> Result<u32, DnsError> {
    bytes
        .get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| DnsError::DecodeError("truncated u32".to_string()))
}

/// A zone's public signing key (RFC 4034 §2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl Dnskey {
    pub fn parse(rdata: &[u8]) -> Result<Self, DnsError> {
        if rdata.len() < 4 {
            return Err(DnsError::DecodeError("DNSKEY rdata too short".to_string()));
        }
        Ok(Self {
            flags: take_u16(rdata, 0)?,
            protocol: rdata[2],
            algorithm: rdata[3],
            public_key: rdata[4..].to_vec(),
        })
    }

    pub fn rdata_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(4 + self.public_key.len());
        wire.extend_from_slice(&self.flags.to_be_bytes());
        wire.push(self.protocol);
        wire.push(self.algorithm);
        wire.extend_from_slice(&self.public_key);
        wire
    }

    /// RFC 4034 Appendix B key tag over the rdata wire form.
    pub fn key_tag(&self) -> u16 {
        let mut acc: u32 = 0;
        for (i, byte) in self.rdata_wire().iter().enumerate() {
            acc += if i & 1 == 0 {
                u32::from(*byte) << 8
            } else {
                u32::from(*byte)
            };
        }
        acc += (acc >> 16) & 0xFFFF;
        (acc & 0xFFFF) as u16
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & FLAG_ZONE_KEY != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & FLAG_SEP != 0
    }
}

/// A delegation signer digest (RFC 4034 §5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

impl Ds {
    pub fn parse(rdata: &[u8]) -> Result<Self, DnsError> {
        if rdata.len() < 4 {
            return Err(DnsError::DecodeError("DS rdata too short".to_string()));
        }
        Ok(Self {
            key_tag: take_u16(rdata, 0)?,
            algorithm: rdata[2],
            digest_type: rdata[3],
            digest: rdata[4..].to_vec(),
        })
    }
}

/// A signature over an RRset (RFC 4034 §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: u16,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: Arc<str>,
    pub signature: Vec<u8>,
}

impl Rrsig {
    pub fn parse(rdata: &[u8]) -> Result<Self, DnsError> {
        if rdata.len() < 18 {
            return Err(DnsError::DecodeError("RRSIG rdata too short".to_string()));
        }
        let (signer, sig_start) = read_name(rdata, 18)?;
        Ok(Self {
            type_covered: take_u16(rdata, 0)?,
            algorithm: rdata[2],
            labels: rdata[3],
            original_ttl: take_u32(rdata, 4)?,
            expiration: take_u32(rdata, 8)?,
            inception: take_u32(rdata, 12)?,
            key_tag: take_u16(rdata, 16)?,
            signer,
            signature: rdata[sig_start..].to_vec(),
        })
    }

    /// RRSIG rdata with the signature field excluded and the signer name in
    /// canonical form: the prefix of the RFC 4035 §5.3.2 signed data.
    pub fn signed_prefix(&self) -> Result<Vec<u8>, DnsError> {
        let mut wire = Vec::with_capacity(18 + self.signer.len() + 2);
        wire.extend_from_slice(&self.type_covered.to_be_bytes());
        wire.push(self.algorithm);
        wire.push(self.labels);
        wire.extend_from_slice(&self.original_ttl.to_be_bytes());
        wire.extend_from_slice(&self.expiration.to_be_bytes());
        wire.extend_from_slice(&self.inception.to_be_bytes());
        wire.extend_from_slice(&self.key_tag.to_be_bytes());
        wire.extend_from_slice(&name_to_wire(&self.signer)?);
        Ok(wire)
    }

    /// Inception ≤ now ≤ expiration, in the 32-bit wire timestamp space.
    pub fn is_time_valid(&self, now: u64) -> bool {
        let now = now as u32;
        self.inception <= now && now <= self.expiration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dnskey_fields() {
        let mut rdata = vec![0x01, 0x01, 3, 8];
        rdata.extend_from_slice(b"fake-key-bytes");
        let key = Dnskey::parse(&rdata).unwrap();
        assert_eq!(key.flags, 0x0101);
        assert_eq!(key.protocol, 3);
        assert_eq!(key.algorithm, 8);
        assert!(key.is_zone_key());
        assert!(key.is_sep());
        assert_eq!(key.rdata_wire(), rdata);
    }

    #[test]
    fn parses_rrsig_with_signer_name() {
        let mut rdata = Vec::new();
        rdata.extend_from_slice(&1u16.to_be_bytes()); // covers A
        rdata.push(8); // algorithm
        rdata.push(2); // labels
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&2000u32.to_be_bytes()); // expiration
        rdata.extend_from_slice(&1000u32.to_be_bytes()); // inception
        rdata.extend_from_slice(&20326u16.to_be_bytes());
        rdata.extend_from_slice(b"\x07Example\x03com\x00");
        rdata.extend_from_slice(b"signature-bytes");

        let rrsig = Rrsig::parse(&rdata).unwrap();
        assert_eq!(rrsig.type_covered, 1);
        assert_eq!(&*rrsig.signer, "example.com.");
        assert_eq!(rrsig.signature, b"signature-bytes");
        assert!(rrsig.is_time_valid(1500));
        assert!(!rrsig.is_time_valid(999));
        assert!(!rrsig.is_time_valid(2001));

        let prefix = rrsig.signed_prefix().unwrap();
        assert_eq!(&prefix[..18], &rdata[..18]);
        assert_eq!(&prefix[18..], b"\x07example\x03com\x00");
    }

    #[test]
    fn rejects_compressed_signer() {
        let mut rdata = vec![0u8; 18];
        rdata.extend_from_slice(&[0xC0, 0x0C]);
        assert!(Rrsig::parse(&rdata).is_err());
    }

    #[test]
    fn key_tag_matches_reference_formula() {
        // A tiny fixed key; the tag must be stable across refactors.
        let key = Dnskey {
            flags: 256,
            protocol: 3,
            algorithm: 8,
            public_key: vec![0x03, 0x01, 0x00, 0x01, 0xAB, 0xCD],
        };
        let wire = key.rdata_wire();
        let mut acc: u32 = 0;
        for (i, b) in wire.iter().enumerate() {
            acc += if i % 2 == 0 {
                (*b as u32) << 8
            } else {
                *b as u32
            };
        }
        acc += (acc >> 16) & 0xFFFF;
        assert_eq!(key.key_tag(), (acc & 0xFFFF) as u16);
    }

    #[test]
    fn name_wire_is_lowercase() {
        assert_eq!(name_to_wire(".").unwrap(), vec![0]);
        assert_eq!(
            name_to_wire("Example.COM.").unwrap(),
            b"\x07example\x03com\x00".to_vec()
        );
    }
}
