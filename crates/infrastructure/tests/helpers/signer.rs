//! Test-only zone signer: one Ed25519 key signing every scripted zone, so
//! engine tests exercise the full DS → DNSKEY → RRSIG chain.

#![allow(dead_code)]

use super::wire;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::signature::{Ed25519KeyPair, KeyPair};
use rootward_infrastructure::dns::dnssec::types::{name_to_wire, Dnskey, Rrsig};
use rootward_infrastructure::dns::dnssec::verify::signed_data_raw;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const ED25519_ALGORITHM: u8 = 15;

pub struct TestSigner {
    keypair: Ed25519KeyPair,
    pub key: Dnskey,
}

impl TestSigner {
    pub fn new() -> Self {
        let seed = [7u8; 32];
        let keypair =
            Ed25519KeyPair::from_seed_unchecked(&seed).expect("fixed seed builds a keypair");
        let key = Dnskey {
            flags: 257,
            protocol: 3,
            algorithm: ED25519_ALGORITHM,
            public_key: keypair.public_key().as_ref().to_vec(),
        };
        Self { keypair, key }
    }

    /// Base64 public key for a prevalidated-DNSKEY trust anchor entry.
    pub fn public_b64(&self) -> String {
        STANDARD.encode(&self.key.public_key)
    }

    pub fn dnskey_rdata(&self) -> Vec<u8> {
        wire::dnskey_rdata(self.key.flags, self.key.algorithm, &self.key.public_key)
    }

    /// DS rdata delegating to this key at `owner`.
    pub fn ds_rdata_for(&self, owner: &str) -> Vec<u8> {
        let mut data = name_to_wire(owner).expect("test owner is valid");
        data.extend_from_slice(&self.key.rdata_wire());
        let digest = Sha256::digest(&data);
        wire::ds_rdata(self.key.key_tag(), self.key.algorithm, 2, &digest)
    }

    /// Sign an RRset and return the RRSIG rdata for the wire.
    pub fn rrsig_rdata(
        &self,
        owner: &str,
        rtype: u16,
        ttl: u32,
        rdatas: &[Vec<u8>],
        signer: &str,
        now: u64,
    ) -> Vec<u8> {
        let stripped = owner.strip_suffix('.').unwrap_or(owner);
        let labels = if stripped.is_empty() {
            0
        } else {
            stripped.split('.').count() as u8
        };

        let mut rrsig = Rrsig {
            type_covered: rtype,
            algorithm: self.key.algorithm,
            labels,
            original_ttl: ttl,
            expiration: (now + 86_400) as u32,
            inception: now.saturating_sub(3_600) as u32,
            key_tag: self.key.key_tag(),
            signer: Arc::from(signer),
            signature: Vec::new(),
        };

        let signed = signed_data_raw(&rrsig, owner, 1, rdatas).expect("signable rrset");
        rrsig.signature = self.keypair.sign(&signed).as_ref().to_vec();

        let mut rdata = rrsig.signed_prefix().expect("rrsig prefix");
        rdata.extend_from_slice(&rrsig.signature);
        rdata
    }
}

impl Default for TestSigner {
    fn default() -> Self {
        Self::new()
    }
}
