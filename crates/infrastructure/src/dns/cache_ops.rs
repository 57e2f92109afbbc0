//! Adapter exposing the record cache through the application-layer
//! diagnostics port.

use crate::dns::cache::{Question, RankedCache};
use hickory_proto::rr::RecordType;
use rootward_application::{CacheRow, RrCacheOps};
use rootward_domain::name;
use std::str::FromStr;

impl RrCacheOps for RankedCache {
    fn read(&self, now: u64, name_str: &str, rtype_str: &str) -> Option<CacheRow> {
        let canonical = name::canonicalize(name_str).ok()?;
        let rtype = RecordType::from_str(rtype_str).ok()?;
        let question = Question::internet(canonical, rtype);
        let (ttl, hit, ranking) = self.lookup(now, &question)?;
        Some(CacheRow {
            name: question.name.to_string(),
            rtype: question.rtype.to_string(),
            ranking,
            kind: hit.kind(),
            expiry: now + u64::from(ttl),
        })
    }

    fn expire_now(&self, now: u64) -> usize {
        self.expires(now)
    }

    fn size(&self) -> usize {
        RankedCache::size(self)
    }

    fn dump(&self) -> Vec<CacheRow> {
        RankedCache::dump(self)
            .into_iter()
            .map(|entry| CacheRow {
                name: entry.question.name.to_string(),
                rtype: entry.question.rtype.to_string(),
                ranking: entry.ranking,
                kind: entry.kind,
                expiry: entry.expiry,
            })
            .collect()
    }
}
