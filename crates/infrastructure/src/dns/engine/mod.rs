//! The resolution engine: cache-first lookups, the iterative walk, answer
//! validation, and CNAME chasing.

pub mod answer;
pub mod dnssec_fill;
pub mod iterative;
pub mod priming;

use crate::dns::cache::{CachedAnswer, Hit, Question, RankedCache};
use crate::dns::delegation::Delegation;
use crate::dns::dnssec::{verify_rrset, VerifiedRrset};
use crate::dns::env::ResolverEnv;
use crate::dns::norec::{norec_with_payload, NorecReply};
use crate::dns::transport::Proto;
use answer::{build_reply, ReplyParts};
use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, Record, RecordType};
use rootward_application::{QueryControls, Reply, ResolverPort, TransportTag};
use rootward_domain::{name, DnsError, Ranking, VerifyError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest CNAME chain followed before giving up.
const MAX_CNAME_CHAIN: usize = 12;

/// One resolution pass: obtain the zone cut for `qname` and ask it the real
/// question. CNAME chasing happens a level above, in [`query`].
pub(crate) async fn resolve(
    env: &ResolverEnv,
    qname: &Arc<str>,
    qtype: RecordType,
    depth: usize,
) -> Result<(NorecReply, Delegation), DnsError> {
    resolve_with_payload(env, qname, qtype, depth, env.config.udp_payload_size).await
}

pub(crate) async fn resolve_with_payload(
    env: &ResolverEnv,
    qname: &Arc<str>,
    qtype: RecordType,
    depth: usize,
    udp_payload: u16,
) -> Result<(NorecReply, Delegation), DnsError> {
    let root = priming::refresh_root(env).await;
    let nss = iterative::iterative(env, (*root).clone(), qname, depth).await?;
    let addrs = iterative::delegation_addresses(env, &nss, depth).await?;
    let reply =
        norec_with_payload(env, nss.is_signed(), udp_payload, &addrs, qname, qtype).await?;
    Ok((reply, nss))
}

/// Resolve a client question to a finished reply: canonicalize, serve from
/// cache when possible, otherwise walk the hierarchy, validate, cache, and
/// follow CNAME redirections up to the chain bound.
pub async fn query(
    env: &ResolverEnv,
    qname_raw: &str,
    qtype: RecordType,
    controls: &QueryControls,
) -> Result<Reply, DnsError> {
    match qtype {
        RecordType::AXFR | RecordType::IXFR => return Err(DnsError::NotImplemented),
        _ => {}
    }
    let canonical = name::canonicalize(qname_raw)?;
    let do_bit = controls.dnssec_ok.unwrap_or(env.config.dnssec_ok_default);
    let udp_payload = controls.udp_size.unwrap_or(env.config.udp_payload_size);

    let mut owner: Arc<str> = canonical.clone();
    let mut chain: Vec<Record> = Vec::new();
    let mut all_valid = true;
    let mut transport = TransportTag::Cache;
    let mut request_bytes = 0usize;
    let mut response_bytes = 0usize;

    for _hop in 0..=MAX_CNAME_CHAIN {
        let now = env.now();
        let direct_key = Question::internet(owner.clone(), qtype);

        // Cache: a direct hit for the current owner.
        if let Some((_, hit, _)) = env.cache.lookup(now, &direct_key) {
            let verified = hit.is_verified();
            match env.cache.lookup_either(now, &direct_key) {
                Some(CachedAnswer::Positive { records, .. }) => {
                    debug!(qname = %owner, qtype = %qtype, "cache hit");
                    all_valid &= verified;
                    chain.extend(strip_rrsigs(records, do_bit));
                    let message = build_reply(
                        &canonical,
                        qtype,
                        ReplyParts {
                            rcode: ResponseCode::NoError,
                            answers: chain,
                            authority: Vec::new(),
                            authentic: all_valid && verified_reply_allowed(controls),
                            rd: controls.rd,
                            cd: controls.cd,
                        },
                    )?;
                    return Ok(finish(message, transport, request_bytes, response_bytes));
                }
                Some(CachedAnswer::Negative { soa, rcode, .. }) => {
                    debug!(qname = %owner, qtype = %qtype, rcode = ?rcode, "negative cache hit");
                    let message = build_reply(
                        &canonical,
                        qtype,
                        ReplyParts {
                            rcode,
                            answers: chain,
                            authority: soa,
                            authentic: false,
                            rd: controls.rd,
                            cd: controls.cd,
                        },
                    )?;
                    return Ok(finish(message, transport, request_bytes, response_bytes));
                }
                None => {}
            }
        }

        // Cache: a CNAME redirection for the current owner.
        if qtype != RecordType::CNAME {
            let cname_key = Question::internet(owner.clone(), RecordType::CNAME);
            if let Some((_, hit, _)) = env.cache.lookup(now, &cname_key) {
                if let Hit::Positive { ref rdatas, .. } = hit {
                    if let Some(target) = rdatas.iter().find_map(|rdata| match rdata {
                        RData::CNAME(cname) => {
                            Some(crate::dns::cache::canonical_owner(&cname.0))
                        }
                        _ => None,
                    }) {
                        if let Some(CachedAnswer::Positive { records, .. }) =
                            env.cache.lookup_either(now, &cname_key)
                        {
                            all_valid &= hit.is_verified();
                            chain.extend(strip_rrsigs(records, do_bit));
                            owner = target;
                            continue;
                        }
                    }
                }
            }
        }

        // Network.
        let (nreply, nss) = resolve_with_payload(env, &owner, qtype, 0, udp_payload).await?;
        transport = match nreply.protocol {
            Proto::Udp => TransportTag::Udp,
            Proto::Tcp => TransportTag::Tcp,
        };
        request_bytes += nreply.request_bytes;
        response_bytes += nreply.response_bytes;
        let msg = &nreply.message;
        let now = env.now();
        let rcode = msg.response_code();

        let direct = answer::answers_for(msg, &owner, qtype);
        let cname = answer::cname_for(msg, &owner);

        // Servers must not return both the requested type and a CNAME for
        // one owner.
        if !direct.is_empty() && cname.is_some() && qtype != RecordType::CNAME {
            return Err(DnsError::UnexpectedRdata(format!(
                "{owner} answered with both {qtype} and CNAME"
            )));
        }

        if rcode == ResponseCode::NXDomain || (direct.is_empty() && cname.is_none()) {
            answer::cache_response_sections(&env.cache, now, msg);
            answer::cache_negative(
                &env.cache,
                now,
                msg,
                owner.clone(),
                qtype,
                env.config.negative_min_ttl_cap,
            );
            let authority = answer::soas_in_authority(msg)
                .into_iter()
                .flat_map(|(_, records, _)| records)
                .collect();
            let message = build_reply(
                &canonical,
                qtype,
                ReplyParts {
                    rcode,
                    answers: chain,
                    authority,
                    authentic: false,
                    rd: controls.rd,
                    cd: controls.cd,
                },
            )?;
            return Ok(finish(message, transport, request_bytes, response_bytes));
        }

        if !direct.is_empty() {
            let validated = validate_and_cache(env, now, msg, &nss, &owner, qtype, controls)?;
            all_valid &= validated;
            answer::cache_response_sections(&env.cache, now, msg);
            chain.extend(direct);
            if do_bit && validated {
                chain.extend(answer::answer_rrsigs_for(msg, &owner));
            }
            let message = build_reply(
                &canonical,
                qtype,
                ReplyParts {
                    rcode: ResponseCode::NoError,
                    answers: chain,
                    authority: Vec::new(),
                    authentic: all_valid
                        && nss.is_signed()
                        && verified_reply_allowed(controls),
                    rd: controls.rd,
                    cd: controls.cd,
                },
            )?;
            return Ok(finish(message, transport, request_bytes, response_bytes));
        }

        // CNAME only: cache it, follow it.
        let Some((cname_records, target)) = cname else {
            return Err(DnsError::UnexpectedRdata(format!(
                "{owner} answer section held neither {qtype} nor CNAME"
            )));
        };
        let validated =
            validate_and_cache(env, now, msg, &nss, &owner, RecordType::CNAME, controls)?;
        all_valid &= validated;
        answer::cache_response_sections(&env.cache, now, msg);
        debug!(qname = %owner, target = %target, "following CNAME");
        chain.extend(cname_records);
        owner = target;
    }

    warn!(qname = %canonical, "CNAME chain exceeded {MAX_CNAME_CHAIN} links");
    Err(DnsError::ServerFailure(format!(
        "CNAME chain for {canonical} exceeds {MAX_CNAME_CHAIN} links"
    )))
}

/// Validate the answer RRset when the zone is signed and write it into the
/// cache with the appropriate rank and verification state. Returns whether
/// the RRset is DNSSEC-valid.
fn validate_and_cache(
    env: &ResolverEnv,
    now: u64,
    msg: &hickory_proto::op::Message,
    nss: &Delegation,
    owner: &Arc<str>,
    rtype: RecordType,
    controls: &QueryControls,
) -> Result<bool, DnsError> {
    let ranking = Ranking::answer_section(msg.authoritative());

    if !nss.is_signed() {
        env.cache.insert_rrs(now, msg.answers(), ranking);
        return Ok(false);
    }

    match verify_rrset(&nss.dnskeys, &nss.zone, now, msg.answers(), owner, rtype) {
        Ok(VerifiedRrset::Valid { rrset, rrsigs }) => {
            env.cache.insert_with_expires(
                now,
                Question::internet(owner.clone(), rtype),
                rrset.ttl,
                Hit::verified(rrset.rdatas, rrsigs),
                ranking,
            );
            Ok(true)
        }
        Ok(VerifiedRrset::NotVerified { sig_count, .. }) => {
            if sig_count > 0 && !controls.cd {
                warn!(zone = %nss.zone, owner = %owner, rtype = %rtype, "answer RRset is bogus");
                return Err(VerifyError::BadSignature.into());
            }
            env.cache.insert_rrs(now, msg.answers(), ranking);
            Ok(false)
        }
        Err(VerifyError::EmptyRrset) => Ok(false),
        Err(e) => {
            if controls.cd {
                env.cache.insert_rrs(now, msg.answers(), ranking);
                Ok(false)
            } else {
                Err(e.into())
            }
        }
    }
}

fn verified_reply_allowed(controls: &QueryControls) -> bool {
    !controls.cd
}

fn strip_rrsigs(records: Vec<Record>, do_bit: bool) -> Vec<Record> {
    if do_bit {
        records
    } else {
        records
            .into_iter()
            .filter(|r| r.record_type() != RecordType::RRSIG)
            .collect()
    }
}

fn finish(
    message: hickory_proto::op::Message,
    transport: TransportTag,
    request_bytes: usize,
    response_bytes: usize,
) -> Reply {
    Reply {
        message,
        transport,
        request_bytes,
        response_bytes,
    }
}

/// The engine behind the application-layer resolver port.
pub struct ResolverService {
    env: Arc<ResolverEnv>,
}

impl ResolverService {
    pub fn new(env: Arc<ResolverEnv>) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Arc<ResolverEnv> {
        &self.env
    }

    pub fn cache(&self) -> &Arc<RankedCache> {
        &self.env.cache
    }
}

#[async_trait]
impl ResolverPort for ResolverService {
    async fn resolve(
        &self,
        qname: &str,
        rtype: RecordType,
        controls: &QueryControls,
    ) -> Result<Reply, DnsError> {
        query(&self.env, qname, rtype, controls).await
    }
}
