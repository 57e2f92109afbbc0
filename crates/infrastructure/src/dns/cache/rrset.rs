//! RRset grouping: turning loose resource records into canonical RRsets
//! before they may enter the cache.

use super::key::{canonical_owner, Question};
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use std::sync::Arc;
use thiserror::Error;

/// A validated RRset: all records share one (name, type, class), the class
/// is Internet, every rdata matches the declared type, and at least one
/// record is present. The effective TTL is the minimum over the members.
#[derive(Clone, Debug)]
pub struct Rrset {
    pub name: Arc<str>,
    pub rtype: RecordType,
    pub class: DNSClass,
    pub ttl: u32,
    pub rdatas: Vec<RData>,
}

impl Rrset {
    pub fn question(&self) -> Question {
        Question::new(self.name.clone(), self.rtype, self.class)
    }

    /// Materialize the RRset back into records with the given TTL.
    pub fn to_records(&self, ttl: u32) -> Result<Vec<Record>, RrsetError> {
        let name = hickory_proto::rr::Name::from_utf8(&self.name)
            .map_err(|e| RrsetError::BadOwner(self.name.to_string(), e.to_string()))?;
        Ok(self
            .rdatas
            .iter()
            .map(|rdata| Record::from_rdata(name.clone(), ttl, rdata.clone()))
            .collect())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RrsetError {
    #[error("RRset for {0} is not Internet class")]
    NotInternet(String),

    #[error("record type {expected} does not match rdata type {found} at {name}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("empty RRset")]
    Empty,

    #[error("owner name {0} cannot be rebuilt: {1}")]
    BadOwner(String, String),
}

/// A grouped-but-not-yet-inserted RRset together with its cache key: the
/// deferred constructor handed to the insert path.
#[derive(Clone, Debug)]
pub struct PendingRrset {
    pub key: Question,
    pub ttl: u32,
    pub rrset: Rrset,
}

impl PendingRrset {
    pub fn new(rrset: Rrset) -> Self {
        Self {
            key: rrset.question(),
            ttl: rrset.ttl,
            rrset,
        }
    }
}

/// Group records by (name, type, class), preserving first-seen order, and
/// validate each group. Invalid groups are surfaced, never silently dropped.
pub fn group_rrsets(records: &[Record]) -> Vec<Result<Rrset, RrsetError>> {
    let mut order: Vec<Question> = Vec::new();
    let mut groups: Vec<Vec<&Record>> = Vec::new();

    for record in records {
        let key = Question::new(
            canonical_owner(record.name()),
            record.record_type(),
            record.dns_class(),
        );
        match order.iter().position(|q| *q == key) {
            Some(idx) => groups[idx].push(record),
            None => {
                order.push(key);
                groups.push(vec![record]);
            }
        }
    }

    order
        .into_iter()
        .zip(groups)
        .map(|(key, members)| validate_group(key, &members))
        .collect()
}

fn validate_group(key: Question, members: &[&Record]) -> Result<Rrset, RrsetError> {
    if members.is_empty() {
        return Err(RrsetError::Empty);
    }
    if key.class != DNSClass::IN {
        return Err(RrsetError::NotInternet(key.name.to_string()));
    }

    let mut ttl = u32::MAX;
    let mut rdatas = Vec::with_capacity(members.len());
    for record in members {
        let rdata = record.data();
        if rdata.record_type() != key.rtype {
            return Err(RrsetError::TypeMismatch {
                name: key.name.to_string(),
                expected: key.rtype.to_string(),
                found: rdata.record_type().to_string(),
            });
        }
        ttl = ttl.min(record.ttl());
        rdatas.push(rdata.clone());
    }

    Ok(Rrset {
        name: key.name,
        rtype: key.rtype,
        class: key.class,
        ttl,
        rdatas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::Name;
    use std::str::FromStr;

    fn a_record(name: &str, ttl: u32, last_octet: u8) -> Record {
        Record::from_rdata(
            Name::from_str(name).unwrap(),
            ttl,
            RData::A(A::new(192, 0, 2, last_octet)),
        )
    }

    #[test]
    fn groups_share_name_type_class_and_min_ttl() {
        let records = vec![
            a_record("example.com.", 300, 1),
            a_record("example.com.", 120, 2),
            a_record("other.com.", 60, 3),
        ];
        let groups = group_rrsets(&records);
        assert_eq!(groups.len(), 2);

        let first = groups[0].as_ref().unwrap();
        assert_eq!(&*first.name, "example.com.");
        assert_eq!(first.ttl, 120);
        assert_eq!(first.rdatas.len(), 2);

        let second = groups[1].as_ref().unwrap();
        assert_eq!(&*second.name, "other.com.");
        assert_eq!(second.rdatas.len(), 1);
    }

    #[test]
    fn grouping_is_case_insensitive_on_owner() {
        let records = vec![
            a_record("Example.COM.", 300, 1),
            a_record("example.com.", 300, 2),
        ];
        let groups = group_rrsets(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].as_ref().unwrap().rdatas.len(), 2);
    }

    #[test]
    fn materialize_and_regroup_round_trips() {
        let records = vec![
            a_record("example.com.", 300, 1),
            a_record("example.com.", 300, 2),
        ];
        let groups = group_rrsets(&records);
        let rrset = groups[0].as_ref().unwrap();

        let rebuilt = rrset.to_records(rrset.ttl).unwrap();
        let regrouped = group_rrsets(&rebuilt);
        assert_eq!(regrouped.len(), 1);
        let again = regrouped[0].as_ref().unwrap();
        assert_eq!(again.rdatas, rrset.rdatas);
        assert_eq!(again.ttl, rrset.ttl);
        assert_eq!(again.name, rrset.name);
    }

    #[test]
    fn non_internet_class_is_rejected() {
        let mut record = a_record("example.com.", 300, 1);
        record.set_dns_class(DNSClass::CH);
        let groups = group_rrsets(&[record]);
        assert!(matches!(groups[0], Err(RrsetError::NotInternet(_))));
    }
}
