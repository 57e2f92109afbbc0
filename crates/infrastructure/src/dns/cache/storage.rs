//! The ranked, TTL-indexed resource-record cache.
//!
//! A binary heap ordered by absolute expiry plus an `FxHashMap` index form
//! the priority-search structure; both live behind one mutex so the
//! rank-monotonicity check and the insert it guards are a single atomic
//! step. Heap nodes are invalidated lazily through per-entry stamps, so
//! replacement never rebuilds the heap.

use super::entry::{CacheEntry, Hit};
use super::key::Question;
use super::rrset::{group_rrsets, PendingRrset, RrsetError};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use rootward_domain::Ranking;
use rustc_hash::FxHashMap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// An answer materialized out of the cache, ready to be placed in a reply.
#[derive(Clone, Debug)]
pub enum CachedAnswer {
    Positive {
        records: Vec<Record>,
        ranking: Ranking,
    },
    Negative {
        /// SOA records backing the negative answer; empty when the SOA has
        /// already fallen out of the cache or the entry never had one.
        soa: Vec<Record>,
        rcode: ResponseCode,
        ranking: Ranking,
    },
}

/// One row of a diagnostic cache dump.
#[derive(Clone, Debug)]
pub struct DumpEntry {
    pub question: Question,
    pub expiry: u64,
    pub ranking: Ranking,
    pub kind: &'static str,
}

struct SweepNode {
    expiry: u64,
    stamp: u64,
    question: Question,
}

impl PartialEq for SweepNode {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry && self.stamp == other.stamp
    }
}

impl Eq for SweepNode {}

impl PartialOrd for SweepNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SweepNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiry
            .cmp(&other.expiry)
            .then(self.stamp.cmp(&other.stamp))
    }
}

struct Inner {
    map: FxHashMap<Question, CacheEntry>,
    heap: BinaryHeap<Reverse<SweepNode>>,
    next_stamp: u64,
}

impl Inner {
    /// Drop heap heads whose stamp no longer matches the live entry.
    fn drop_stale_heads(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            let live = self
                .map
                .get(&head.question)
                .map(|entry| entry.stamp == head.stamp)
                .unwrap_or(false);
            if live {
                break;
            }
            self.heap.pop();
        }
    }

    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    fn put(&mut self, question: Question, hit: Hit, ranking: Ranking, expiry: u64) {
        let stamp = self.stamp();
        self.heap.push(Reverse(SweepNode {
            expiry,
            stamp,
            question: question.clone(),
        }));
        self.map.insert(
            question,
            CacheEntry {
                hit,
                ranking,
                expiry,
                stamp,
            },
        );
    }
}

pub struct RankedCache {
    inner: Mutex<Inner>,
    max_size: usize,
}

impl RankedCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: FxHashMap::default(),
                heap: BinaryHeap::new(),
                next_stamp: 0,
            }),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    /// Insert a hit, honoring the ranking discipline and the size bound.
    ///
    /// An unexpired entry is only replaced by a strictly greater rank. At
    /// capacity the earliest-expiring entry is evicted, unless the incoming
    /// expiry would not outlive it, in which case the insert is rejected.
    /// Returns whether the cache changed.
    pub fn insert(
        &self,
        now: u64,
        question: Question,
        ttl: u32,
        hit: Hit,
        ranking: Ranking,
    ) -> bool {
        let expiry = now.saturating_add(u64::from(ttl));
        self.insert_at(now, question, expiry, hit, ranking)
    }

    fn insert_at(
        &self,
        now: u64,
        question: Question,
        expiry: u64,
        hit: Hit,
        ranking: Ranking,
    ) -> bool {
        if self.max_size == 0 {
            return false;
        }
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if let Some(existing) = inner.map.get(&question) {
            if existing.expiry > now && ranking <= existing.ranking {
                return false;
            }
            // Replacement: same key, size unchanged.
            inner.put(question, hit, ranking, expiry);
            return true;
        }

        if inner.map.len() < self.max_size {
            inner.put(question, hit, ranking, expiry);
            return true;
        }

        // At capacity: the earliest-expiring entry decides.
        inner.drop_stale_heads();
        let Some(Reverse(head)) = inner.heap.peek() else {
            warn!(size = inner.map.len(), "cache heap drained below map size");
            return false;
        };
        if expiry <= head.expiry {
            return false;
        }
        let evicted = head.question.clone();
        inner.heap.pop();
        inner.map.remove(&evicted);
        debug!(
            name = %evicted.name,
            rtype = %evicted.rtype,
            "evicted earliest-expiring cache entry"
        );
        inner.put(question, hit, ranking, expiry);
        true
    }

    /// Look up an unexpired entry. Expired entries are never returned, even
    /// before a sweep removes them.
    pub fn lookup(&self, now: u64, question: &Question) -> Option<(u32, Hit, Ranking)> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let entry = inner.map.get(question)?;
        let ttl = entry.ttl_remaining(now)?;
        Some((ttl, entry.hit.clone(), entry.ranking))
    }

    /// Materialize an entry for reply building. Negative hits pull in their
    /// backing SOA with the TTL capped at the negative entry's remainder.
    pub fn lookup_either(&self, now: u64, question: &Question) -> Option<CachedAnswer> {
        let (ttl, hit, ranking) = self.lookup(now, question)?;
        match hit {
            Hit::Positive { rdatas, rrsigs } => {
                let name = match Name::from_utf8(&question.name) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(name = %question.name, error = %e, "cached owner name unusable");
                        return None;
                    }
                };
                let mut records: Vec<Record> = rdatas
                    .into_iter()
                    .map(|rdata| Record::from_rdata(name.clone(), ttl, rdata))
                    .collect();
                records.extend(
                    rrsigs
                        .into_iter()
                        .map(|rdata| Record::from_rdata(name.clone(), ttl, rdata)),
                );
                Some(CachedAnswer::Positive { records, ranking })
            }
            Hit::Negative { soa_owner, rcode } => {
                let soa = self
                    .lookup(now, &Question::soa(soa_owner.clone()))
                    .and_then(|(soa_ttl, soa_hit, _)| match soa_hit {
                        Hit::Positive { rdatas, .. } => {
                            let name = Name::from_utf8(&soa_owner).ok()?;
                            let ttl = ttl.min(soa_ttl);
                            Some(
                                rdatas
                                    .into_iter()
                                    .map(|rdata| Record::from_rdata(name.clone(), ttl, rdata))
                                    .collect::<Vec<_>>(),
                            )
                        }
                        _ => None,
                    })
                    .unwrap_or_default();
                Some(CachedAnswer::Negative {
                    soa,
                    rcode,
                    ranking,
                })
            }
            Hit::NegativeNoSoa { rcode } => Some(CachedAnswer::Negative {
                soa: Vec::new(),
                rcode,
                ranking,
            }),
        }
    }

    /// Bulk-remove every entry whose expiry has passed. Returns the number
    /// of removed entries; zero means the earliest entry is still live.
    pub fn expires(&self, now: u64) -> usize {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let mut removed = 0;
        loop {
            inner.drop_stale_heads();
            match inner.heap.peek() {
                Some(Reverse(head)) if head.expiry <= now => {
                    let question = head.question.clone();
                    inner.heap.pop();
                    inner.map.remove(&question);
                    removed += 1;
                }
                _ => break,
            }
        }
        removed
    }

    /// Sweep-then-insert, so insertion boundaries keep the cache clean
    /// without a background timer.
    pub fn insert_with_expires(
        &self,
        now: u64,
        question: Question,
        ttl: u32,
        hit: Hit,
        ranking: Ranking,
    ) -> bool {
        self.expires(now);
        self.insert(now, question, ttl, hit, ranking)
    }

    /// Group loose records into RRsets and insert each valid group as an
    /// unverified positive entry. Invalid groups are returned to the caller.
    pub fn insert_rrs(
        &self,
        now: u64,
        records: &[Record],
        ranking: Ranking,
    ) -> (usize, Vec<RrsetError>) {
        self.expires(now);
        let mut inserted = 0;
        let mut errors = Vec::new();
        for group in group_rrsets(records) {
            match group {
                Ok(rrset) => {
                    if self.insert_pending(now, PendingRrset::new(rrset), ranking) {
                        inserted += 1;
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        (inserted, errors)
    }

    /// Insert a grouped RRset under its own key.
    pub fn insert_pending(&self, now: u64, pending: PendingRrset, ranking: Ranking) -> bool {
        let PendingRrset { key, ttl, rrset } = pending;
        self.insert(now, key, ttl, Hit::unverified(rrset.rdatas), ranking)
    }

    /// Stub-resolver insert: fixed `Answer` rank, externally supplied
    /// absolute expiry.
    pub fn stub_insert(&self, now: u64, question: Question, expiry: u64, hit: Hit) -> bool {
        self.insert_at(now, question, expiry, hit, Ranking::Answer)
    }

    /// Stub-resolver lookup: rank is not surfaced.
    pub fn stub_lookup(&self, now: u64, question: &Question) -> Option<(u32, Hit)> {
        self.lookup(now, question).map(|(ttl, hit, _)| (ttl, hit))
    }

    /// Whether a positive, DNSSEC-validated entry exists for the question.
    pub fn lookup_verified(&self, now: u64, question: &Question) -> Option<(u32, Hit)> {
        let (ttl, hit, _) = self.lookup(now, question)?;
        hit.is_verified().then_some((ttl, hit))
    }

    /// Snapshot for diagnostics.
    pub fn dump(&self) -> Vec<DumpEntry> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let mut entries: Vec<DumpEntry> = inner
            .map
            .iter()
            .map(|(question, entry)| DumpEntry {
                question: question.clone(),
                expiry: entry.expiry,
                ranking: entry.ranking,
                kind: entry.hit.kind(),
            })
            .collect();
        entries.sort_by_key(|e| e.expiry);
        entries
    }

    /// Remove every entry of the given type; diagnostics helper.
    pub fn purge_type(&self, rtype: RecordType) -> usize {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let before = inner.map.len();
        inner.map.retain(|question, _| question.rtype != rtype);
        before - inner.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::RData;
    use std::sync::Arc;

    fn a_hit(last_octet: u8) -> Hit {
        Hit::unverified(vec![RData::A(A::new(192, 0, 2, last_octet))])
    }

    fn q(name: &str) -> Question {
        Question::internet(Arc::from(name), RecordType::A)
    }

    #[test]
    fn zero_capacity_disables_inserts() {
        let cache = RankedCache::new(0);
        assert!(!cache.insert(0, q("a.example."), 60, a_hit(1), Ranking::AuthAnswer));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn lower_rank_never_overwrites_higher() {
        let cache = RankedCache::new(8);
        assert!(cache.insert(0, q("a.example."), 60, a_hit(1), Ranking::AuthAnswer));
        assert!(!cache.insert(0, q("a.example."), 60, a_hit(2), Ranking::Answer));
        assert!(!cache.insert(0, q("a.example."), 60, a_hit(3), Ranking::AuthAnswer));

        let (_, hit, ranking) = cache.lookup(0, &q("a.example.")).unwrap();
        assert_eq!(ranking, Ranking::AuthAnswer);
        match hit {
            Hit::Positive { rdatas, .. } => {
                assert_eq!(rdatas, vec![RData::A(A::new(192, 0, 2, 1))])
            }
            _ => panic!("expected positive hit"),
        }
    }

    #[test]
    fn higher_rank_replaces_and_preserves_size() {
        let cache = RankedCache::new(1);
        assert!(cache.insert(0, q("a.example."), 60, a_hit(1), Ranking::Additional));
        assert!(cache.insert(0, q("a.example."), 60, a_hit(2), Ranking::Answer));
        assert_eq!(cache.size(), 1);
        let (_, _, ranking) = cache.lookup(0, &q("a.example.")).unwrap();
        assert_eq!(ranking, Ranking::Answer);
    }

    #[test]
    fn expired_entries_are_invisible_then_swept() {
        let cache = RankedCache::new(8);
        cache.insert(0, q("a.example."), 30, a_hit(1), Ranking::Answer);
        assert!(cache.lookup(29, &q("a.example.")).is_some());
        assert!(cache.lookup(30, &q("a.example.")).is_none());
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.expires(30), 1);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn expired_entry_is_replaceable_at_any_rank() {
        let cache = RankedCache::new(8);
        cache.insert(0, q("a.example."), 30, a_hit(1), Ranking::AuthAnswer);
        assert!(cache.insert(60, q("a.example."), 30, a_hit(2), Ranking::Additional));
        let (_, _, ranking) = cache.lookup(61, &q("a.example.")).unwrap();
        assert_eq!(ranking, Ranking::Additional);
    }

    #[test]
    fn eviction_removes_earliest_expiry() {
        let cache = RankedCache::new(2);
        cache.insert(0, q("a.example."), 10, a_hit(1), Ranking::Answer);
        cache.insert(0, q("b.example."), 100, a_hit(2), Ranking::Answer);

        // Shorter-lived than the current minimum: rejected.
        assert!(!cache.insert(0, q("c.example."), 5, a_hit(3), Ranking::Answer));
        assert!(cache.lookup(0, &q("a.example.")).is_some());

        // Outlives the minimum: evicts it.
        assert!(cache.insert(0, q("d.example."), 50, a_hit(4), Ranking::Answer));
        assert_eq!(cache.size(), 2);
        assert!(cache.lookup(0, &q("a.example.")).is_none());
        assert!(cache.lookup(0, &q("b.example.")).is_some());
        assert!(cache.lookup(0, &q("d.example.")).is_some());
    }

    #[test]
    fn ttl_decays_with_lookup_time() {
        let cache = RankedCache::new(8);
        cache.insert(100, q("a.example."), 300, a_hit(1), Ranking::Answer);
        let (ttl, _, _) = cache.lookup(105, &q("a.example.")).unwrap();
        assert_eq!(ttl, 295);
    }

    #[test]
    fn stub_insert_uses_absolute_expiry() {
        let cache = RankedCache::new(8);
        assert!(cache.stub_insert(0, q("a.example."), 42, a_hit(1)));
        let (ttl, _) = cache.stub_lookup(40, &q("a.example.")).unwrap();
        assert_eq!(ttl, 2);
        assert!(cache.stub_lookup(42, &q("a.example.")).is_none());
    }
}
