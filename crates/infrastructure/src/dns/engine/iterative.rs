//! The iterative walk: descend the delegation hierarchy from the root one
//! super-domain at a time, reusing cached zone cuts and filling DNSSEC
//! state at every step.

use super::answer::{cache_negative, cache_response_sections};
use super::dnssec_fill::fill_dnssec;
use crate::dns::cache::{canonical_owner, CachedAnswer, Hit, Question};
use crate::dns::delegation::{
    find_delegation, ns_names_in, select_addresses, Delegation, DelegationBuilder, DsState,
    Freshness, NotFilledReason,
};
use crate::dns::dnssec::verify_rrset;
use crate::dns::env::ResolverEnv;
use crate::dns::norec::norec;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, Record, RecordType};
use rootward_domain::name::{in_zone, is_strict_subdomain, super_domains};
use rootward_domain::{DnsError, Ranking, VerifyError};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consecutive steps that fail to descend before the walk is declared
/// stuck.
const MAX_NON_DESCENT_STEPS: usize = 16;

/// Nested resolutions allowed for glueless NS names.
const MAX_GLUELESS_DEPTH: usize = 4;

/// TTL of the "no delegation here" memo.
const ERR_MEMO_TTL: u32 = 300;

const ADDRS_PER_QUERY: usize = 3;

enum Step {
    Delegate(Delegation),
    NoDelegation,
}

/// Walk from `start` down to the zone cut containing `qname`.
pub(crate) async fn iterative(
    env: &ResolverEnv,
    start: Delegation,
    qname: &str,
    depth: usize,
) -> Result<Delegation, DnsError> {
    let mut nss = start;
    let mut non_descent = 0usize;

    for x in super_domains(qname) {
        if in_zone(&nss.zone, &x) {
            // A previous referral already jumped at or below this level.
            continue;
        }
        let now = env.now();
        if env.cache.lookup(now, &Question::err(x.clone())).is_some() {
            debug!(step = %x, "cached: no delegation at this level");
            continue;
        }

        let candidate = match cached_delegation(env, now, &x) {
            Some(delegation) => {
                debug!(zone = %x, "reusing cached delegation");
                Some(delegation)
            }
            None => match step_query(env, &nss, &x, depth).await? {
                Step::Delegate(delegation) => Some(delegation),
                Step::NoDelegation => {
                    env.cache.insert_with_expires(
                        now,
                        Question::err(x.clone()),
                        ERR_MEMO_TTL,
                        Hit::NegativeNoSoa {
                            rcode: ResponseCode::NoError,
                        },
                        Ranking::Additional,
                    );
                    None
                }
            },
        };

        if let Some(mut next) = candidate {
            fill_dnssec(env, &nss, &mut next).await?;
            if is_strict_subdomain(&next.zone, &nss.zone) {
                non_descent = 0;
            } else {
                non_descent += 1;
                if non_descent > MAX_NON_DESCENT_STEPS {
                    warn!(zone = %next.zone, "delegation walk stopped descending");
                    return Err(DnsError::ServerFailure(format!(
                        "delegation at {} does not descend",
                        next.zone
                    )));
                }
            }
            nss = next;
        }
    }
    Ok(nss)
}

/// Rebuild a delegation for `zone` from cached NS and glue records.
fn cached_delegation(env: &ResolverEnv, now: u64, zone: &Arc<str>) -> Option<Delegation> {
    let (_, hit, _) = env
        .cache
        .lookup(now, &Question::internet(zone.clone(), RecordType::NS))?;
    let Hit::Positive { rdatas, .. } = hit else {
        return None;
    };

    let ns_names: Vec<Arc<str>> = rdatas
        .iter()
        .filter_map(|rdata| match rdata {
            RData::NS(ns) => Some(canonical_owner(&ns.0)),
            _ => None,
        })
        .collect();

    // Pull whatever glue survived in the cache.
    let mut glue: Vec<Record> = Vec::new();
    for name in &ns_names {
        for rtype in [RecordType::A, RecordType::AAAA] {
            if let Some(CachedAnswer::Positive { records, .. }) = env
                .cache
                .lookup_either(now, &Question::internet(name.clone(), rtype))
            {
                glue.extend(records);
            }
        }
    }

    let builder: DelegationBuilder = find_delegation(zone.clone(), &ns_names, &glue)?;
    let mut delegation = builder.not_filled(NotFilledReason::CachedDelegation);
    delegation.fresh = Freshness::Cached;
    Some(delegation)
}

/// One step of the walk: ask the current NS set about `x` and classify the
/// response as a referral, a sibling-zone cut, or no delegation.
async fn step_query(
    env: &ResolverEnv,
    nss: &Delegation,
    x: &Arc<str>,
    depth: usize,
) -> Result<Step, DnsError> {
    let addrs = delegation_addresses(env, nss, depth).await?;
    // Minimized probe: ask for A at the step name rather than leaking the
    // full question (RFC 9156 recommends an address type).
    let reply = norec(env, nss.is_signed(), &addrs, x, RecordType::A).await?;
    let msg = &reply.message;
    let now = env.now();

    // Referral: the deepest NS owner at or above x, strictly below the
    // zone we asked.
    let mut ns_owners: Vec<Arc<str>> = msg
        .name_servers()
        .iter()
        .filter(|r| r.record_type() == RecordType::NS)
        .map(|r| canonical_owner(r.name()))
        .collect();
    ns_owners.sort();
    ns_owners.dedup();
    ns_owners.retain(|z| in_zone(x, z) && is_strict_subdomain(z, &nss.zone));
    ns_owners.sort_by_key(|z| z.split('.').count());

    if let Some(z) = ns_owners.last().cloned() {
        if !nss.dnskeys.is_empty() {
            match verify_rrset(
                &nss.dnskeys,
                &nss.zone,
                now,
                msg.name_servers(),
                &z,
                RecordType::NS,
            ) {
                Ok(verified) if verified.is_bogus() => {
                    warn!(zone = %z, parent = %nss.zone, "bogus NS RRset in referral");
                    return Err(DnsError::ServerFailure(format!(
                        "referral NS RRset for {z} failed validation"
                    )));
                }
                Ok(_) | Err(VerifyError::EmptyRrset) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let ns_names = ns_names_in(msg.name_servers(), &z);
        let Some(builder) = find_delegation(z.clone(), &ns_names, msg.additionals()) else {
            return Ok(Step::NoDelegation);
        };

        let ns_records: Vec<Record> = msg
            .name_servers()
            .iter()
            .filter(|r| r.record_type() == RecordType::NS && canonical_owner(r.name()) == z)
            .cloned()
            .collect();
        env.cache
            .insert_rrs(now, &ns_records, Ranking::authority_section());
        env.cache
            .insert_rrs(now, msg.additionals(), Ranking::additional_section());

        debug!(zone = %z, servers = ns_names.len(), "following referral");
        return Ok(Step::Delegate(builder.not_filled(NotFilledReason::Referral)));
    }

    // Sibling-zone workaround: the same server is authoritative for the
    // child and answered with its SOA instead of a referral.
    let soa_owners: Vec<Arc<str>> = msg
        .name_servers()
        .iter()
        .filter(|r| r.record_type() == RecordType::SOA)
        .map(|r| canonical_owner(r.name()))
        .collect();
    if soa_owners.len() > 1 {
        return Err(DnsError::ServerFailure(
            "multiple SOA records in authority section".to_string(),
        ));
    }
    if soa_owners.first().map(|o| o == x).unwrap_or(false) {
        debug!(zone = %x, "sibling zone on the same servers, forcing DS fill");
        return Ok(Step::Delegate(Delegation {
            zone: x.clone(),
            ns_entries: nss.ns_entries.clone(),
            ds_state: DsState::NotFilledDs(NotFilledReason::ServsChildZone),
            dnskeys: Vec::new(),
            fresh: Freshness::Fresh,
        }));
    }

    // No zone cut at x; remember what the server told us and move on.
    cache_response_sections(&env.cache, now, msg);
    let rcode = msg.response_code();
    let has_data = msg
        .answers()
        .iter()
        .any(|r| &*canonical_owner(r.name()) == &**x);
    if rcode == ResponseCode::NXDomain || (rcode == ResponseCode::NoError && !has_data) {
        cache_negative(
            &env.cache,
            now,
            msg,
            x.clone(),
            RecordType::A,
            env.config.negative_min_ttl_cap,
        );
    }
    Ok(Step::NoDelegation)
}

/// Target addresses for the current NS set: glue first, then cached
/// addresses, then a bounded nested resolution for glueless NS names.
pub(crate) async fn delegation_addresses(
    env: &ResolverEnv,
    nss: &Delegation,
    depth: usize,
) -> Result<Vec<IpAddr>, DnsError> {
    let addrs = select_addresses(&nss.ns_entries, env.config.disable_v6_ns, ADDRS_PER_QUERY);
    if !addrs.is_empty() {
        return Ok(addrs);
    }

    let now = env.now();
    let mut pool: Vec<IpAddr> = Vec::new();
    for name in nss.ns_names() {
        for rtype in [RecordType::A, RecordType::AAAA] {
            if rtype == RecordType::AAAA && env.config.disable_v6_ns {
                continue;
            }
            if let Some(CachedAnswer::Positive { records, .. }) = env
                .cache
                .lookup_either(now, &Question::internet(name.clone(), rtype))
            {
                pool.extend(records.iter().filter_map(record_address));
            }
        }
    }

    if pool.is_empty() {
        if depth >= MAX_GLUELESS_DEPTH {
            return Err(DnsError::ServerFailure(format!(
                "glueless delegation for {} exceeds nesting limit",
                nss.zone
            )));
        }
        for name in nss.ns_names().into_iter().take(2) {
            debug!(ns = %name, zone = %nss.zone, "resolving glueless name server");
            match Box::pin(super::resolve(env, &name, RecordType::A, depth + 1)).await {
                Ok((reply, _)) => {
                    let records: Vec<Record> = reply
                        .message
                        .answers()
                        .iter()
                        .filter(|r| {
                            r.record_type() == RecordType::A
                                && canonical_owner(r.name()) == name
                        })
                        .cloned()
                        .collect();
                    env.cache
                        .insert_rrs(env.now(), &records, Ranking::answer_section(true));
                    pool.extend(records.iter().filter_map(record_address));
                }
                Err(e) => {
                    warn!(ns = %name, error = %e, "glueless NS resolution failed");
                }
            }
            if !pool.is_empty() {
                break;
            }
        }
    }

    pool.sort();
    pool.dedup();
    fastrand::shuffle(&mut pool);
    pool.truncate(ADDRS_PER_QUERY);
    if pool.is_empty() {
        return Err(DnsError::ServerFailure(format!(
            "no reachable addresses for the {} NS set",
            nss.zone
        )));
    }
    Ok(pool)
}

fn record_address(record: &Record) -> Option<IpAddr> {
    match record.data() {
        RData::A(a) => Some(IpAddr::V4(a.0)),
        RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
        _ => None,
    }
}
