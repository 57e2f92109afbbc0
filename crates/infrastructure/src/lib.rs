//! rootward infrastructure layer: the iterative, DNSSEC-validating
//! resolver core and its adapters.

pub mod dns;
