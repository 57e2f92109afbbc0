use hickory_proto::rr::{DNSClass, Name, RecordType};
use std::sync::Arc;

/// Pseudo-type used as the key type for cached rcode-level failures that are
/// not tied to a concrete qtype (RFC 6895 §3.1 private-use range). Negative
/// answers for a real qtype are keyed on that qtype, never on this sentinel.
pub const ERR_RTYPE: RecordType = RecordType::Unknown(0xFF00);

/// Cache key: canonical owner name, record type and class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: Arc<str>,
    pub rtype: RecordType,
    pub class: DNSClass,
}

impl Question {
    #[inline]
    pub fn new(name: Arc<str>, rtype: RecordType, class: DNSClass) -> Self {
        Self { name, rtype, class }
    }

    /// Internet-class key, the common case throughout the resolver.
    #[inline]
    pub fn internet(name: Arc<str>, rtype: RecordType) -> Self {
        Self::new(name, rtype, DNSClass::IN)
    }

    /// Key of the SOA entry that backs a negative answer.
    #[inline]
    pub fn soa(name: Arc<str>) -> Self {
        Self::internet(name, RecordType::SOA)
    }

    /// Key for an rcode-level failure memo at `name`.
    #[inline]
    pub fn err(name: Arc<str>) -> Self {
        Self::internet(name, ERR_RTYPE)
    }
}

/// Canonical form of a wire name for use as a cache-key coordinate:
/// lowercase, trailing root dot.
pub fn canonical_owner(name: &Name) -> Arc<str> {
    let mut owner = name.to_utf8().to_ascii_lowercase();
    if !owner.ends_with('.') {
        owner.push('.');
    }
    Arc::from(owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn canonical_owner_lowercases_and_roots() {
        let name = Name::from_str("WWW.Example.COM.").unwrap();
        assert_eq!(&*canonical_owner(&name), "www.example.com.");

        let root = Name::from_str(".").unwrap();
        assert_eq!(&*canonical_owner(&root), ".");
    }

    #[test]
    fn err_sentinel_is_private_use() {
        assert_eq!(ERR_RTYPE, RecordType::Unknown(0xFF00));
        let q = Question::err(Arc::from("example.com."));
        assert_eq!(q.rtype, ERR_RTYPE);
        assert_eq!(q.class, DNSClass::IN);
    }

    #[test]
    fn questions_compare_by_all_coordinates() {
        let a = Question::internet(Arc::from("example.com."), RecordType::A);
        let b = Question::internet(Arc::from("example.com."), RecordType::AAAA);
        let c = Question::internet(Arc::from("example.com."), RecordType::A);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
