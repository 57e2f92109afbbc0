//! Query construction and response sanity checks for the norec client.

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use rootward_domain::DnsError;

/// Build a non-recursive query (RD=0, AD=0, CD=0) with EDNS0 and serialize
/// it to wire format.
pub fn build_query(
    id: u16,
    qname: &str,
    rtype: RecordType,
    dnssec_ok: bool,
    udp_payload: u16,
) -> Result<(Message, Vec<u8>), DnsError> {
    let name = Name::from_utf8(qname)
        .map_err(|e| DnsError::IllegalDomain(format!("{qname}: {e}")))?;

    let mut query = Query::query(name, rtype);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(false);
    message.set_authentic_data(false);
    message.set_checking_disabled(false);
    message.add_query(query);

    let edns = message.extensions_mut().get_or_insert_with(Edns::new);
    edns.set_version(0);
    edns.set_max_payload(udp_payload);
    edns.set_dnssec_ok(dnssec_ok);

    let bytes = message
        .to_vec()
        .map_err(|e| DnsError::DecodeError(format!("serialize query: {e}")))?;
    Ok((message, bytes))
}

/// ID and question-section checks on a received response.
///
/// A FORMERR reply is allowed to carry an empty question section; servers
/// that cannot parse EDNS strip it.
pub fn check_response(query: &Message, response: &Message) -> Result<(), DnsError> {
    if response.id() != query.id() {
        return Err(DnsError::SequenceNumberMismatch);
    }
    if response.response_code() == ResponseCode::FormErr && response.queries().is_empty() {
        return Ok(());
    }

    let sent = query.queries().first().ok_or(DnsError::FormatError)?;
    let got = response.queries().first().ok_or(DnsError::QuestionMismatch)?;
    if sent.name() != got.name()
        || sent.query_type() != got.query_type()
        || sent.query_class() != got.query_class()
    {
        return Err(DnsError::QuestionMismatch);
    }
    Ok(())
}

/// Map a terminal response code onto the error taxonomy. `None` for codes
/// the engine handles as data (NOERROR, NXDOMAIN).
pub fn rcode_error(rcode: ResponseCode) -> Option<DnsError> {
    match rcode {
        ResponseCode::NoError | ResponseCode::NXDomain => None,
        ResponseCode::ServFail => Some(DnsError::ServerFailure("upstream SERVFAIL".to_string())),
        ResponseCode::NotImp => Some(DnsError::NotImplemented),
        ResponseCode::Refused => Some(DnsError::OperationRefused),
        ResponseCode::FormErr => Some(DnsError::FormatError),
        ResponseCode::BADVERS => Some(DnsError::BadOptRecord),
        other => Some(DnsError::UnknownDnsError(other.to_string())),
    }
}
