pub mod anchors;
pub mod types;
pub mod verify;

pub use anchors::TrustAnchors;
pub use types::{Dnskey, Ds, Rrsig};
pub use verify::{
    dnskeys_in, dss_in, select_sep_dnskeys, signed_data_for_rrset, verify_ds, verify_rrsig,
    verify_rrset, VerifiedRrset,
};
