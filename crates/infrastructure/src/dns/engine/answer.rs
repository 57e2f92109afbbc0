//! Materializing authoritative responses into the cache and building
//! client-facing replies.

use crate::dns::cache::{canonical_owner, Hit, Question, RankedCache};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use rootward_domain::{DnsError, Ranking};
use std::sync::Arc;
use tracing::debug;

/// Negative TTL for entries that arrive without any SOA to derive one from.
const NO_SOA_NEGATIVE_TTL: u32 = 300;

/// Answer-section records owned by `name` of type `rtype`.
pub fn answers_for(msg: &Message, name: &str, rtype: RecordType) -> Vec<Record> {
    msg.answers()
        .iter()
        .filter(|r| r.record_type() == rtype && &*canonical_owner(r.name()) == name)
        .cloned()
        .collect()
}

/// RRSIG records in the answer section owned by `name`.
pub fn answer_rrsigs_for(msg: &Message, name: &str) -> Vec<Record> {
    msg.answers()
        .iter()
        .filter(|r| r.record_type() == RecordType::RRSIG && &*canonical_owner(r.name()) == name)
        .cloned()
        .collect()
}

/// The CNAME redirection for `name`, if the answer section holds one.
pub fn cname_for(msg: &Message, name: &str) -> Option<(Vec<Record>, Arc<str>)> {
    let records: Vec<Record> = msg
        .answers()
        .iter()
        .filter(|r| {
            r.record_type() == RecordType::CNAME && &*canonical_owner(r.name()) == name
        })
        .cloned()
        .collect();
    let target = records.iter().find_map(|r| match r.data() {
        RData::CNAME(cname) => Some(canonical_owner(&cname.0)),
        _ => None,
    })?;
    Some((records, target))
}

/// SOA records in the authority section as (owner, negative TTL) pairs,
/// where the negative TTL is `min(soa.minimum, ttl_of_soa_rr)` (RFC 2308).
pub fn soas_in_authority(msg: &Message) -> Vec<(Arc<str>, Vec<Record>, u32)> {
    msg.name_servers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::SOA(soa) => Some((
                canonical_owner(r.name()),
                vec![r.clone()],
                soa.minimum().min(r.ttl()),
            )),
            _ => None,
        })
        .collect()
}

/// Apply the section-to-rank rules to a full response. Answer-section data
/// ranks by the AA flag; authority and additional data never rank above
/// `Additional`.
pub fn cache_response_sections(cache: &RankedCache, now: u64, msg: &Message) {
    let aa = msg.authoritative();
    let (answers, _) = cache.insert_rrs(now, msg.answers(), Ranking::answer_section(aa));
    let (authority, _) = cache.insert_rrs(now, msg.name_servers(), Ranking::authority_section());
    let (additionals, _) = cache.insert_rrs(now, msg.additionals(), Ranking::additional_section());
    debug!(
        answers,
        authority, additionals, aa, "cached response sections"
    );
}

/// Record a negative answer for `(qname, qtype)` per RFC 2308: keyed on the
/// original qtype, TTL from the SOA minimum capped by configuration, falling
/// back to a self-contained no-SOA entry.
pub fn cache_negative(
    cache: &RankedCache,
    now: u64,
    msg: &Message,
    qname: Arc<str>,
    qtype: RecordType,
    negative_ttl_cap: u32,
) {
    let rcode = msg.response_code();
    let ranking = Ranking::answer_section(msg.authoritative());
    let key = Question::internet(qname.clone(), qtype);

    match soas_in_authority(msg).into_iter().next() {
        Some((soa_owner, _, neg_ttl)) => {
            let ttl = neg_ttl.min(negative_ttl_cap);
            debug!(qname = %qname, qtype = %qtype, soa = %soa_owner, ttl, "caching negative answer");
            cache.insert_with_expires(
                now,
                key,
                ttl,
                Hit::Negative { soa_owner, rcode },
                ranking,
            );
        }
        None => {
            let ttl = NO_SOA_NEGATIVE_TTL.min(negative_ttl_cap);
            debug!(qname = %qname, qtype = %qtype, ttl, "caching negative answer without SOA");
            cache.insert_with_expires(now, key, ttl, Hit::NegativeNoSoa { rcode }, ranking);
        }
    }
}

/// Pieces of a reply the engine assembled.
pub struct ReplyParts {
    pub rcode: ResponseCode,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub authentic: bool,
    pub rd: bool,
    pub cd: bool,
}

/// Build the response message handed back to the front-end.
pub fn build_reply(
    qname: &str,
    qtype: RecordType,
    parts: ReplyParts,
) -> Result<Message, DnsError> {
    let name =
        Name::from_utf8(qname).map_err(|e| DnsError::IllegalDomain(format!("{qname}: {e}")))?;
    let mut query = Query::query(name, qtype);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message.set_message_type(MessageType::Response);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(parts.rd);
    message.set_recursion_available(true);
    message.set_checking_disabled(parts.cd);
    message.set_authentic_data(parts.authentic);
    message.set_response_code(parts.rcode);
    message.add_query(query);
    for record in parts.answers {
        message.add_answer(record);
    }
    for record in parts.authority {
        message.add_name_server(record);
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::{A, CNAME, SOA};
    use std::str::FromStr;

    fn soa_record(owner: &str, ttl: u32, minimum: u32) -> Record {
        let mname = Name::from_str("ns1.example.com.").unwrap();
        let rname = Name::from_str("hostmaster.example.com.").unwrap();
        Record::from_rdata(
            Name::from_str(owner).unwrap(),
            ttl,
            RData::SOA(SOA::new(mname, rname, 2024010101, 7200, 3600, 1209600, minimum)),
        )
    }

    fn response(rcode: ResponseCode, aa: bool) -> Message {
        let mut msg = Message::new();
        msg.set_message_type(MessageType::Response);
        msg.set_authoritative(aa);
        msg.set_response_code(rcode);
        msg
    }

    #[test]
    fn negative_ttl_is_min_of_soa_minimum_and_record_ttl() {
        let mut msg = response(ResponseCode::NXDomain, true);
        msg.add_name_server(soa_record("example.com.", 900, 3600));
        let soas = soas_in_authority(&msg);
        assert_eq!(soas.len(), 1);
        assert_eq!(soas[0].2, 900);

        let mut msg = response(ResponseCode::NXDomain, true);
        msg.add_name_server(soa_record("example.com.", 7200, 300));
        assert_eq!(soas_in_authority(&msg)[0].2, 300);
    }

    #[test]
    fn negative_entries_key_on_the_original_qtype() {
        let cache = RankedCache::new(16);
        let mut msg = response(ResponseCode::NXDomain, true);
        msg.add_name_server(soa_record("example.com.", 3600, 600));

        let qname: Arc<str> = Arc::from("nosuchname.example.com.");
        cache_negative(&cache, 0, &msg, qname.clone(), RecordType::A, 1800);

        let hit = cache.lookup(0, &Question::internet(qname.clone(), RecordType::A));
        let (ttl, hit, _) = hit.expect("negative entry cached under qtype A");
        assert_eq!(ttl, 600);
        match hit {
            Hit::Negative { soa_owner, rcode } => {
                assert_eq!(&*soa_owner, "example.com.");
                assert_eq!(rcode, ResponseCode::NXDomain);
            }
            other => panic!("expected negative hit, got {other:?}"),
        }
        assert!(cache
            .lookup(0, &Question::err(qname))
            .is_none());
    }

    #[test]
    fn negative_cap_bounds_the_ttl() {
        let cache = RankedCache::new(16);
        let mut msg = response(ResponseCode::NXDomain, true);
        msg.add_name_server(soa_record("example.com.", 86400, 86400));
        cache_negative(
            &cache,
            0,
            &msg,
            Arc::from("gone.example.com."),
            RecordType::AAAA,
            1800,
        );
        let (ttl, _, _) = cache
            .lookup(0, &Question::internet(Arc::from("gone.example.com."), RecordType::AAAA))
            .unwrap();
        assert_eq!(ttl, 1800);
    }

    #[test]
    fn missing_soa_produces_self_contained_entry() {
        let cache = RankedCache::new(16);
        let msg = response(ResponseCode::NXDomain, false);
        cache_negative(
            &cache,
            0,
            &msg,
            Arc::from("x.example.com."),
            RecordType::A,
            1800,
        );
        let (ttl, hit, _) = cache
            .lookup(0, &Question::internet(Arc::from("x.example.com."), RecordType::A))
            .unwrap();
        assert_eq!(ttl, 300);
        assert!(matches!(hit, Hit::NegativeNoSoa { rcode } if rcode == ResponseCode::NXDomain));
    }

    #[test]
    fn cname_extraction_follows_owner() {
        let mut msg = response(ResponseCode::NoError, true);
        msg.add_answer(Record::from_rdata(
            Name::from_str("www.example.com.").unwrap(),
            300,
            RData::CNAME(CNAME(Name::from_str("host.example.net.").unwrap())),
        ));
        msg.add_answer(Record::from_rdata(
            Name::from_str("host.example.net.").unwrap(),
            300,
            RData::A(A::new(192, 0, 2, 9)),
        ));

        let (records, target) = cname_for(&msg, "www.example.com.").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&*target, "host.example.net.");
        assert!(cname_for(&msg, "host.example.net.").is_none());
        assert_eq!(answers_for(&msg, "host.example.net.", RecordType::A).len(), 1);
    }

    #[test]
    fn authority_section_never_outranks_glue() {
        let cache = RankedCache::new(16);
        let glue = Record::from_rdata(
            Name::from_str("ns1.example.com.").unwrap(),
            3600,
            RData::A(A::new(192, 0, 2, 53)),
        );
        // Glue from a referral.
        cache.insert_rrs(0, std::slice::from_ref(&glue), Ranking::additional_section());

        // An authoritative response's authority section must not replace it
        // with different data.
        let mut msg = response(ResponseCode::NoError, true);
        let other = Record::from_rdata(
            Name::from_str("ns1.example.com.").unwrap(),
            3600,
            RData::A(A::new(203, 0, 113, 66)),
        );
        msg.add_name_server(other);
        cache_response_sections(&cache, 0, &msg);

        let (_, hit, ranking) = cache
            .lookup(0, &Question::internet(Arc::from("ns1.example.com."), RecordType::A))
            .unwrap();
        assert_eq!(ranking, Ranking::Additional);
        match hit {
            Hit::Positive { rdatas, .. } => {
                assert_eq!(rdatas, vec![RData::A(A::new(192, 0, 2, 53))]);
            }
            other => panic!("unexpected hit {other:?}"),
        }
    }
}
