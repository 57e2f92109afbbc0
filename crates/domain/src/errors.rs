use thiserror::Error;

/// Response code the front-end should surface for a failed resolution.
///
/// Kept wire-library-free; the infrastructure layer maps these onto the
/// codec's response-code type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcodeHint {
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    BadVers,
}

/// DNSSEC validation failures. Fatal for the zone cut they occur at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("unsupported DS digest type: {0}")]
    UnsupportedDigest(u8),

    #[error("malformed key material: {0}")]
    BadKeyData(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("RRSIG outside its validity window")]
    SignatureExpired,

    #[error("no DNSKEY matches any DS record for {0}")]
    NoMatchingDnskey(String),

    #[error("DS present but DNSKEY chain could not be validated for {0}")]
    DanglingDs(String),

    #[error("RRset is empty")]
    EmptyRrset,

    #[error("RRset is not canonical: {0}")]
    NotCanonical(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("malformed query or response")]
    FormatError,

    #[error("response ID does not match query ID")]
    SequenceNumberMismatch,

    #[error("response question section does not match query")]
    QuestionMismatch,

    #[error("unexpected RDATA: {0}")]
    UnexpectedRdata(String),

    #[error("failed to decode DNS message: {0}")]
    DecodeError(String),

    #[error("server failure: {0}")]
    ServerFailure(String),

    #[error("retry limit exceeded")]
    RetryLimitExceeded,

    #[error("timeout expired")]
    TimeoutExpired,

    #[error("illegal domain name: {0}")]
    IllegalDomain(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("bad configuration: {0}")]
    BadConfiguration(String),

    #[error("no such domain")]
    NameError,

    #[error("query kind not implemented")]
    NotImplemented,

    #[error("operation refused by server")]
    OperationRefused,

    #[error("bad EDNS OPT record")]
    BadOptRecord,

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("unknown DNS error: {0}")]
    UnknownDnsError(String),
}

impl DnsError {
    /// Fixed error-to-RCODE mapping surfaced to clients.
    pub fn rcode(&self) -> RcodeHint {
        match self {
            DnsError::FormatError
            | DnsError::SequenceNumberMismatch
            | DnsError::QuestionMismatch
            | DnsError::UnexpectedRdata(_)
            | DnsError::DecodeError(_) => RcodeHint::FormErr,

            DnsError::ServerFailure(_)
            | DnsError::RetryLimitExceeded
            | DnsError::TimeoutExpired
            | DnsError::IllegalDomain(_)
            | DnsError::NetworkFailure(_)
            | DnsError::BadConfiguration(_)
            | DnsError::Verify(_)
            | DnsError::UnknownDnsError(_) => RcodeHint::ServFail,

            DnsError::NameError => RcodeHint::NxDomain,
            DnsError::NotImplemented => RcodeHint::NotImp,
            DnsError::OperationRefused => RcodeHint::Refused,
            DnsError::BadOptRecord => RcodeHint::BadVers,
        }
    }

    /// Whether a norec-level attempt with this error is worth retrying on
    /// another server or transport.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DnsError::TimeoutExpired
                | DnsError::NetworkFailure(_)
                | DnsError::SequenceNumberMismatch
                | DnsError::ServerFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rcode_mapping_is_fixed() {
        assert_eq!(DnsError::FormatError.rcode(), RcodeHint::FormErr);
        assert_eq!(DnsError::QuestionMismatch.rcode(), RcodeHint::FormErr);
        assert_eq!(DnsError::TimeoutExpired.rcode(), RcodeHint::ServFail);
        assert_eq!(DnsError::NameError.rcode(), RcodeHint::NxDomain);
        assert_eq!(DnsError::NotImplemented.rcode(), RcodeHint::NotImp);
        assert_eq!(DnsError::OperationRefused.rcode(), RcodeHint::Refused);
        assert_eq!(DnsError::BadOptRecord.rcode(), RcodeHint::BadVers);
        assert_eq!(
            DnsError::Verify(VerifyError::BadSignature).rcode(),
            RcodeHint::ServFail
        );
    }

    #[test]
    fn transient_errors_are_retried() {
        assert!(DnsError::TimeoutExpired.is_transient());
        assert!(DnsError::NetworkFailure("conn reset".into()).is_transient());
        assert!(!DnsError::NameError.is_transient());
        assert!(!DnsError::Verify(VerifyError::BadSignature).is_transient());
    }
}
