//! Zone-cut representation: the NS set with glue, the DS state, and the
//! validated keys that let descent continue securely.

pub mod root_hints;

use crate::dns::cache::canonical_owner;
use crate::dns::dnssec::{Dnskey, Ds};
use hickory_proto::rr::{RData, Record, RecordType};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// One name server of a delegation, with whatever glue the referral
/// carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NsEntry {
    OnlyNs(Arc<str>),
    WithA4(Arc<str>, Vec<Ipv4Addr>),
    WithA6(Arc<str>, Vec<Ipv6Addr>),
    WithAx(Arc<str>, Vec<Ipv4Addr>, Vec<Ipv6Addr>),
}

impl NsEntry {
    pub fn name(&self) -> &Arc<str> {
        match self {
            NsEntry::OnlyNs(name)
            | NsEntry::WithA4(name, _)
            | NsEntry::WithA6(name, _)
            | NsEntry::WithAx(name, _, _) => name,
        }
    }

    fn from_glue(name: Arc<str>, v4: Vec<Ipv4Addr>, v6: Vec<Ipv6Addr>) -> Self {
        match (v4.is_empty(), v6.is_empty()) {
            (true, true) => NsEntry::OnlyNs(name),
            (false, true) => NsEntry::WithA4(name, v4),
            (true, false) => NsEntry::WithA6(name, v6),
            (false, false) => NsEntry::WithAx(name, v4, v6),
        }
    }
}

/// Why a delegation's DS state is still pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotFilledReason {
    /// A plain referral; the DS set has not been fetched yet.
    Referral,
    /// The referral came from a server serving both parent and child; the
    /// DS set must be fetched before descending.
    ServsChildZone,
    /// The delegation was rebuilt from cached records.
    CachedDelegation,
}

/// DS knowledge for a zone cut. An empty `FilledDs` list is a provably
/// insecure delegation, not an unknown one.
#[derive(Clone, Debug)]
pub enum DsState {
    FilledDs(Vec<Ds>),
    FilledAnchor,
    NotFilledDs(NotFilledReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Cached,
}

/// A zone cut: where authority for `zone` is handed to `ns_entries`.
#[derive(Clone, Debug)]
pub struct Delegation {
    pub zone: Arc<str>,
    pub ns_entries: Vec<NsEntry>,
    pub ds_state: DsState,
    pub dnskeys: Vec<Dnskey>,
    pub fresh: Freshness,
}

impl Delegation {
    /// Whether the chain of trust reaches this zone cut: a DS set (or the
    /// anchor itself) is known and non-empty.
    pub fn has_ds(&self) -> bool {
        match &self.ds_state {
            DsState::FilledDs(dss) => !dss.is_empty(),
            DsState::FilledAnchor => true,
            DsState::NotFilledDs(_) => false,
        }
    }

    /// Queries below this cut should set the DO bit and validate.
    pub fn is_signed(&self) -> bool {
        self.has_ds() && !self.dnskeys.is_empty()
    }

    pub fn ns_names(&self) -> Vec<Arc<str>> {
        self.ns_entries.iter().map(|e| e.name().clone()).collect()
    }
}

/// Deferred constructor produced by [`find_delegation`]: the validated NS
/// set and glue, waiting for its DS state.
#[derive(Clone, Debug)]
pub struct DelegationBuilder {
    zone: Arc<str>,
    ns_entries: Vec<NsEntry>,
}

impl DelegationBuilder {
    pub fn zone(&self) -> &Arc<str> {
        &self.zone
    }

    pub fn with_ds(self, dss: Vec<Ds>) -> Delegation {
        self.finish(DsState::FilledDs(dss))
    }

    pub fn with_anchor(self) -> Delegation {
        self.finish(DsState::FilledAnchor)
    }

    pub fn not_filled(self, reason: NotFilledReason) -> Delegation {
        self.finish(DsState::NotFilledDs(reason))
    }

    fn finish(self, ds_state: DsState) -> Delegation {
        Delegation {
            zone: self.zone,
            ns_entries: self.ns_entries,
            ds_state,
            dnskeys: Vec::new(),
            fresh: Freshness::Fresh,
        }
    }
}

/// Pair NS names with their A/AAAA glue by a sorted merge over owner names.
/// Returns `None` when the NS set is empty.
pub fn find_delegation(
    zone: Arc<str>,
    ns_names: &[Arc<str>],
    additional: &[Record],
) -> Option<DelegationBuilder> {
    if ns_names.is_empty() {
        return None;
    }

    let mut glue: BTreeMap<Arc<str>, (Vec<Ipv4Addr>, Vec<Ipv6Addr>)> = BTreeMap::new();
    for record in additional {
        let owner = canonical_owner(record.name());
        match record.data() {
            RData::A(a) => glue.entry(owner).or_default().0.push(a.0),
            RData::AAAA(aaaa) => glue.entry(owner).or_default().1.push(aaaa.0),
            _ => {}
        }
    }

    let mut sorted_names: Vec<Arc<str>> = ns_names.to_vec();
    sorted_names.sort();
    sorted_names.dedup();

    let ns_entries = sorted_names
        .into_iter()
        .map(|name| match glue.remove(&name) {
            Some((v4, v6)) => NsEntry::from_glue(name, v4, v6),
            None => NsEntry::OnlyNs(name),
        })
        .collect();

    Some(DelegationBuilder { zone, ns_entries })
}

/// NS names present in a section for the given owner.
pub fn ns_names_in(records: &[Record], owner: &str) -> Vec<Arc<str>> {
    records
        .iter()
        .filter(|r| r.record_type() == RecordType::NS && &*canonical_owner(r.name()) == owner)
        .filter_map(|r| match r.data() {
            RData::NS(ns) => Some(canonical_owner(&ns.0)),
            _ => None,
        })
        .collect()
}

/// Choose up to `max` distinct target addresses from the NS set.
///
/// Entries offering both families contribute one randomly-chosen family;
/// IPv6-only entries are skipped entirely when v6 is disabled.
pub fn select_addresses(entries: &[NsEntry], disable_v6: bool, max: usize) -> Vec<IpAddr> {
    let mut pool: Vec<IpAddr> = Vec::new();
    for entry in entries {
        match entry {
            NsEntry::OnlyNs(_) => {}
            NsEntry::WithA4(_, v4) => pool.extend(v4.iter().copied().map(IpAddr::V4)),
            NsEntry::WithA6(_, v6) => {
                if !disable_v6 {
                    pool.extend(v6.iter().copied().map(IpAddr::V6));
                }
            }
            NsEntry::WithAx(_, v4, v6) => {
                if !disable_v6 && fastrand::bool() {
                    pool.extend(v6.iter().copied().map(IpAddr::V6));
                } else {
                    pool.extend(v4.iter().copied().map(IpAddr::V4));
                }
            }
        }
    }
    pool.sort();
    pool.dedup();
    fastrand::shuffle(&mut pool);
    pool.truncate(max);
    pool
}
