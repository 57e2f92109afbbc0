//! Minimal wire-format builder for scripted server responses. Writing the
//! bytes by hand keeps the mock independent of the codec's rdata model, so
//! DNSSEC records can be synthesized freely.

#![allow(dead_code)]

use std::net::Ipv4Addr;

/// Uncompressed lowercase wire form of a dotted name.
pub fn name_wire(name: &str) -> Vec<u8> {
    let stripped = name.strip_suffix('.').unwrap_or(name);
    let mut wire = Vec::new();
    if !stripped.is_empty() {
        for label in stripped.split('.') {
            wire.push(label.len() as u8);
            wire.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        }
    }
    wire.push(0);
    wire
}

/// One record ready for serialization.
#[derive(Clone)]
pub struct WireRecord {
    pub owner: String,
    pub rtype: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl WireRecord {
    pub fn new(owner: &str, rtype: u16, ttl: u32, rdata: Vec<u8>) -> Self {
        Self {
            owner: owner.to_string(),
            rtype,
            ttl,
            rdata,
        }
    }
}

pub fn a_rdata(ip: Ipv4Addr) -> Vec<u8> {
    ip.octets().to_vec()
}

pub fn ns_rdata(host: &str) -> Vec<u8> {
    name_wire(host)
}

pub fn cname_rdata(target: &str) -> Vec<u8> {
    name_wire(target)
}

pub fn soa_rdata(mname: &str, rname: &str, minimum: u32) -> Vec<u8> {
    let mut rdata = name_wire(mname);
    rdata.extend_from_slice(&name_wire(rname));
    rdata.extend_from_slice(&2024010101u32.to_be_bytes()); // serial
    rdata.extend_from_slice(&7200u32.to_be_bytes()); // refresh
    rdata.extend_from_slice(&3600u32.to_be_bytes()); // retry
    rdata.extend_from_slice(&1209600u32.to_be_bytes()); // expire
    rdata.extend_from_slice(&minimum.to_be_bytes());
    rdata
}

pub fn dnskey_rdata(flags: u16, algorithm: u8, public_key: &[u8]) -> Vec<u8> {
    let mut rdata = Vec::with_capacity(4 + public_key.len());
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(3);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);
    rdata
}

pub fn ds_rdata(key_tag: u16, algorithm: u8, digest_type: u8, digest: &[u8]) -> Vec<u8> {
    let mut rdata = Vec::with_capacity(4 + digest.len());
    rdata.extend_from_slice(&key_tag.to_be_bytes());
    rdata.push(algorithm);
    rdata.push(digest_type);
    rdata.extend_from_slice(digest);
    rdata
}

/// Flags for [`build_response`].
#[derive(Clone, Copy, Default)]
pub struct ResponseFlags {
    pub aa: bool,
    pub tc: bool,
    pub rcode: u8,
}

/// Serialize a complete response: header, echoed question, and sections.
pub fn build_response(
    id: u16,
    qname: &str,
    qtype: u16,
    flags: ResponseFlags,
    answers: &[WireRecord],
    authority: &[WireRecord],
    additional: &[WireRecord],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(512);
    bytes.extend_from_slice(&id.to_be_bytes());

    let mut byte2: u8 = 0x80; // QR
    if flags.aa {
        byte2 |= 0x04;
    }
    if flags.tc {
        byte2 |= 0x02;
    }
    bytes.push(byte2);
    bytes.push(flags.rcode & 0x0F); // RA off, AD/CD off

    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&(answers.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&(authority.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&(additional.len() as u16).to_be_bytes());

    bytes.extend_from_slice(&name_wire(qname));
    bytes.extend_from_slice(&qtype.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes()); // IN

    for section in [answers, authority, additional] {
        for record in section {
            bytes.extend_from_slice(&name_wire(&record.owner));
            bytes.extend_from_slice(&record.rtype.to_be_bytes());
            bytes.extend_from_slice(&1u16.to_be_bytes());
            bytes.extend_from_slice(&record.ttl.to_be_bytes());
            bytes.extend_from_slice(&(record.rdata.len() as u16).to_be_bytes());
            bytes.extend_from_slice(&record.rdata);
        }
    }
    bytes
}

pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_SOA: u16 = 6;
pub const TYPE_TXT: u16 = 16;
pub const TYPE_DS: u16 = 43;
pub const TYPE_RRSIG: u16 = 46;
pub const TYPE_DNSKEY: u16 = 48;

pub fn txt_rdata(text: &str) -> Vec<u8> {
    let mut rdata = Vec::with_capacity(text.len() + 1);
    rdata.push(text.len() as u8);
    rdata.extend_from_slice(text.as_bytes());
    rdata
}
