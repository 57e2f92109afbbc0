//! Root priming: bootstrapping a validated root delegation from the
//! compiled hints and the configured trust anchors.

use super::answer::cache_response_sections;
use crate::dns::cache::{Hit, Question};
use crate::dns::delegation::root_hints::root_hint;
use crate::dns::delegation::{find_delegation, ns_names_in, select_addresses, Delegation, Freshness};
use crate::dns::dnssec::{dnskeys_in, verify_rrset, VerifiedRrset};
use crate::dns::env::ResolverEnv;
use crate::dns::norec::norec;
use hickory_proto::rr::RecordType;
use rootward_domain::{DnsError, Ranking, VerifyError};
use std::sync::Arc;
use tracing::{debug, info, warn};

const ADDRS_PER_QUERY: usize = 3;

/// Return the current root delegation: the cell if its NS set is still
/// cached, a fresh priming run otherwise, the compiled hint as a last
/// resort. Never fails; resolution can always start somewhere.
pub async fn refresh_root(env: &ResolverEnv) -> Arc<Delegation> {
    let root_ns = Question::internet(Arc::from("."), RecordType::NS);
    if let Some(root) = env.root_delegation() {
        if env.cache.lookup(env.now(), &root_ns).is_some() {
            let mut cached = (*root).clone();
            cached.fresh = Freshness::Cached;
            return Arc::new(cached);
        }
        debug!("root NS fell out of cache, repriming");
    }

    match root_priming(env).await {
        Ok(delegation) => {
            let delegation = Arc::new(delegation);
            env.set_root_delegation(delegation.clone());
            delegation
        }
        Err(e) => {
            warn!(zone = ".", error = %e, "root priming failed, using compiled hints");
            let mut hint = root_hint(env.anchors.root_dss().to_vec());
            hint.fresh = Freshness::Cached;
            Arc::new(hint)
        }
    }
}

/// Fetch and validate the root DNSKEY and NS RRsets from the hint
/// addresses, and rebuild the root delegation from the result.
async fn root_priming(env: &ResolverEnv) -> Result<Delegation, DnsError> {
    let hint = root_hint(env.anchors.root_dss().to_vec());
    let addrs = select_addresses(&hint.ns_entries, env.config.disable_v6_ns, ADDRS_PER_QUERY);
    let root: Arc<str> = Arc::from(".");

    // DNSKEY first: everything else validates under these keys.
    let key_reply = norec(env, true, &addrs, &root, RecordType::DNSKEY).await?;
    let key_msg = &key_reply.message;
    let now = env.now();

    let keys = dnskeys_in(key_msg.answers(), &root);
    let seps = env.anchors.select_root_seps(&keys);
    if seps.is_empty() {
        return Err(VerifyError::NoMatchingDnskey(".".to_string()).into());
    }

    match verify_rrset(&seps, &root, now, key_msg.answers(), &root, RecordType::DNSKEY)? {
        VerifiedRrset::Valid { rrset, rrsigs } => {
            env.cache.insert_with_expires(
                now,
                Question::internet(root.clone(), RecordType::DNSKEY),
                rrset.ttl,
                Hit::verified(rrset.rdatas, rrsigs),
                Ranking::answer_section(key_msg.authoritative()),
            );
        }
        VerifiedRrset::NotVerified { .. } => {
            return Err(VerifyError::BadSignature.into());
        }
    }

    // Validated NS RRset, then glue.
    let ns_reply = norec(env, true, &addrs, &root, RecordType::NS).await?;
    let ns_msg = &ns_reply.message;
    let now = env.now();

    let verified_ns = verify_rrset(&keys, &root, now, ns_msg.answers(), &root, RecordType::NS)?;
    let (ns_rrset, ns_rrsigs) = match verified_ns {
        VerifiedRrset::Valid { rrset, rrsigs } => (rrset, rrsigs),
        VerifiedRrset::NotVerified { .. } => return Err(VerifyError::BadSignature.into()),
    };

    let ns_names = ns_names_in(ns_msg.answers(), &root);
    let builder = find_delegation(root.clone(), &ns_names, ns_msg.additionals())
        .ok_or_else(|| DnsError::ServerFailure("root NS response held no NS set".to_string()))?;

    env.cache.insert_with_expires(
        now,
        Question::internet(root.clone(), RecordType::NS),
        ns_rrset.ttl,
        Hit::verified(ns_rrset.rdatas, ns_rrsigs),
        Ranking::answer_section(ns_msg.authoritative()),
    );
    cache_response_sections(&env.cache, now, ns_msg);

    let mut delegation = builder.with_anchor();
    delegation.dnskeys = keys;
    delegation.fresh = Freshness::Fresh;
    info!(
        servers = delegation.ns_entries.len(),
        keys = delegation.dnskeys.len(),
        "root delegation primed"
    );
    Ok(delegation)
}
