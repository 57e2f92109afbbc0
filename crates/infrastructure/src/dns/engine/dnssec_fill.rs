//! Populating a fresh delegation's DS set and DNSKEY set from its parent.

use super::answer::{cache_negative, cache_response_sections};
use crate::dns::cache::{Hit, Question};
use crate::dns::delegation::{select_addresses, Delegation, DsState};
use crate::dns::dnssec::types::rdata_wire;
use crate::dns::dnssec::{
    dnskeys_in, select_sep_dnskeys, verify_rrset, Dnskey, Ds, VerifiedRrset,
};
use crate::dns::env::ResolverEnv;
use crate::dns::norec::norec;
use hickory_proto::rr::{RData, RecordType};
use rootward_domain::{DnsError, Ranking, VerifyError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Addresses drawn per query while walking the hierarchy.
const ADDRS_PER_QUERY: usize = 3;

/// Resolve `dest`'s DS state and DNSKEY set using `parent`'s servers and
/// validated keys, so descent below `dest` can continue.
///
/// An unsigned path above (`parent.dnskeys` empty) pins `dest` insecure. A
/// DS set that exists but cannot be carried down to a validated DNSKEY set
/// is a dangling chain and fatal for this zone cut.
pub async fn fill_dnssec(
    env: &ResolverEnv,
    parent: &Delegation,
    dest: &mut Delegation,
) -> Result<(), DnsError> {
    if parent.dnskeys.is_empty() {
        // Chain already broken above this point; stays insecure.
        dest.ds_state = DsState::FilledDs(Vec::new());
        return Ok(());
    }

    if matches!(
        dest.ds_state,
        DsState::FilledDs(_) | DsState::FilledAnchor
    ) && !dest.dnskeys.is_empty()
    {
        return Ok(());
    }

    let dss = match &dest.ds_state {
        DsState::FilledDs(dss) => dss.clone(),
        DsState::FilledAnchor => env.anchors.root_dss().to_vec(),
        DsState::NotFilledDs(reason) => {
            debug!(zone = %dest.zone, reason = ?reason, "fetching DS for pending delegation");
            fetch_ds(env, parent, &dest.zone).await?
        }
    };

    if dss.is_empty() {
        debug!(zone = %dest.zone, "provably insecure delegation");
        dest.ds_state = DsState::FilledDs(Vec::new());
        dest.dnskeys.clear();
        return Ok(());
    }

    let keys = fetch_dnskeys(env, dest, &dss).await?;
    dest.ds_state = DsState::FilledDs(dss);
    dest.dnskeys = keys;
    Ok(())
}

/// DS set for `zone`, validated under the parent's keys. Cache first, then
/// the parent's servers.
async fn fetch_ds(
    env: &ResolverEnv,
    parent: &Delegation,
    zone: &Arc<str>,
) -> Result<Vec<Ds>, DnsError> {
    let now = env.now();
    let ds_key = Question::internet(zone.clone(), RecordType::DS);

    if let Some((_, Hit::Positive { rdatas, .. })) = env.cache.lookup_verified(now, &ds_key) {
        return Ok(parse_ds_rdatas(&rdatas));
    }
    if let Some((_, hit, _)) = env.cache.lookup(now, &ds_key) {
        if !hit.is_positive() {
            return Ok(Vec::new());
        }
    }

    let addrs = select_addresses(&parent.ns_entries, env.config.disable_v6_ns, ADDRS_PER_QUERY);
    let reply = norec(env, true, &addrs, zone, RecordType::DS).await?;
    let msg = &reply.message;
    let now = env.now();

    match verify_rrset(&parent.dnskeys, &parent.zone, now, msg.answers(), zone, RecordType::DS) {
        Ok(VerifiedRrset::Valid { rrset, rrsigs }) => {
            env.cache.insert_with_expires(
                now,
                ds_key,
                rrset.ttl,
                Hit::verified(rrset.rdatas.clone(), rrsigs),
                Ranking::answer_section(msg.authoritative()),
            );
            Ok(parse_ds_rdatas(&rrset.rdatas))
        }
        Ok(VerifiedRrset::NotVerified { .. }) => {
            warn!(zone = %zone, parent = %parent.zone, "DS RRset not validated under signed parent");
            Err(VerifyError::DanglingDs(zone.to_string()).into())
        }
        Err(VerifyError::EmptyRrset) => {
            // NODATA from the parent: no DS, insecure delegation.
            cache_negative(
                &env.cache,
                now,
                msg,
                zone.clone(),
                RecordType::DS,
                env.config.negative_min_ttl_cap,
            );
            cache_response_sections(&env.cache, now, msg);
            Ok(Vec::new())
        }
        Err(e) => {
            warn!(zone = %zone, error = %e, "DS validation failed");
            Err(e.into())
        }
    }
}

/// DNSKEY set for `dest.zone`, anchored in `dss` via SEP selection and
/// self-signature. Cache first, then the child's own servers.
async fn fetch_dnskeys(
    env: &ResolverEnv,
    dest: &Delegation,
    dss: &[Ds],
) -> Result<Vec<Dnskey>, DnsError> {
    let zone = &dest.zone;
    let now = env.now();
    let key_q = Question::internet(zone.clone(), RecordType::DNSKEY);

    if let Some((_, Hit::Positive { rdatas, .. })) = env.cache.lookup_verified(now, &key_q) {
        let keys = parse_dnskey_rdatas(&rdatas);
        if !select_sep_dnskeys(dss, zone, &keys).is_empty() {
            return Ok(keys);
        }
    }

    let addrs = select_addresses(&dest.ns_entries, env.config.disable_v6_ns, ADDRS_PER_QUERY);
    let reply = norec(env, true, &addrs, zone, RecordType::DNSKEY).await?;
    let msg = &reply.message;
    let now = env.now();

    let keys = dnskeys_in(msg.answers(), zone);
    if keys.is_empty() {
        warn!(zone = %zone, "DS present but no DNSKEY obtained");
        return Err(VerifyError::DanglingDs(zone.to_string()).into());
    }

    let seps = select_sep_dnskeys(dss, zone, &keys);
    if seps.is_empty() {
        warn!(zone = %zone, "no DNSKEY matches the DS set");
        return Err(VerifyError::NoMatchingDnskey(zone.to_string()).into());
    }

    match verify_rrset(&seps, zone, now, msg.answers(), zone, RecordType::DNSKEY) {
        Ok(VerifiedRrset::Valid { rrset, rrsigs }) => {
            env.cache.insert_with_expires(
                now,
                key_q,
                rrset.ttl,
                Hit::verified(rrset.rdatas, rrsigs),
                Ranking::answer_section(msg.authoritative()),
            );
            Ok(keys)
        }
        Ok(VerifiedRrset::NotVerified { .. }) => {
            warn!(zone = %zone, "DNSKEY RRset does not verify under its SEP keys");
            Err(VerifyError::DanglingDs(zone.to_string()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_ds_rdatas(rdatas: &[RData]) -> Vec<Ds> {
    rdatas
        .iter()
        .filter_map(|rdata| rdata_wire(rdata).ok())
        .filter_map(|wire| Ds::parse(&wire).ok())
        .collect()
}

fn parse_dnskey_rdatas(rdatas: &[RData]) -> Vec<Dnskey> {
    rdatas
        .iter()
        .filter_map(|rdata| rdata_wire(rdata).ok())
        .filter_map(|wire| Dnskey::parse(&wire).ok())
        .collect()
}
