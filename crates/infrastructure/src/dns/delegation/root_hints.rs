//! Compiled-in root hints: the 13 root servers with their IANA addresses.

use super::{Delegation, DsState, Freshness, NsEntry};
use crate::dns::dnssec::Ds;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// (host, IPv4, IPv6) for a–m.root-servers.net, per the IANA root hints
/// file.
const ROOT_SERVERS: [(&str, Ipv4Addr, Ipv6Addr); 13] = [
    (
        "a.root-servers.net.",
        Ipv4Addr::new(198, 41, 0, 4),
        Ipv6Addr::new(0x2001, 0x503, 0xba3e, 0, 0, 0, 0x2, 0x30),
    ),
    (
        "b.root-servers.net.",
        Ipv4Addr::new(170, 247, 170, 2),
        Ipv6Addr::new(0x2801, 0x1b8, 0x10, 0, 0, 0, 0, 0xb),
    ),
    (
        "c.root-servers.net.",
        Ipv4Addr::new(192, 33, 4, 12),
        Ipv6Addr::new(0x2001, 0x500, 0x2, 0, 0, 0, 0, 0xc),
    ),
    (
        "d.root-servers.net.",
        Ipv4Addr::new(199, 7, 91, 13),
        Ipv6Addr::new(0x2001, 0x500, 0x2d, 0, 0, 0, 0, 0xd),
    ),
    (
        "e.root-servers.net.",
        Ipv4Addr::new(192, 203, 230, 10),
        Ipv6Addr::new(0x2001, 0x500, 0xa8, 0, 0, 0, 0, 0xe),
    ),
    (
        "f.root-servers.net.",
        Ipv4Addr::new(192, 5, 5, 241),
        Ipv6Addr::new(0x2001, 0x500, 0x2f, 0, 0, 0, 0, 0xf),
    ),
    (
        "g.root-servers.net.",
        Ipv4Addr::new(192, 112, 36, 4),
        Ipv6Addr::new(0x2001, 0x500, 0x12, 0, 0, 0, 0, 0xd0d),
    ),
    (
        "h.root-servers.net.",
        Ipv4Addr::new(198, 97, 190, 53),
        Ipv6Addr::new(0x2001, 0x500, 0x1, 0, 0, 0, 0, 0x53),
    ),
    (
        "i.root-servers.net.",
        Ipv4Addr::new(192, 36, 148, 17),
        Ipv6Addr::new(0x2001, 0x7fe, 0, 0, 0, 0, 0, 0x53),
    ),
    (
        "j.root-servers.net.",
        Ipv4Addr::new(192, 58, 128, 30),
        Ipv6Addr::new(0x2001, 0x503, 0xc27, 0, 0, 0, 0x2, 0x30),
    ),
    (
        "k.root-servers.net.",
        Ipv4Addr::new(193, 0, 14, 129),
        Ipv6Addr::new(0x2001, 0x7fd, 0, 0, 0, 0, 0, 0x1),
    ),
    (
        "l.root-servers.net.",
        Ipv4Addr::new(199, 7, 83, 42),
        Ipv6Addr::new(0x2001, 0x500, 0x9f, 0, 0, 0, 0, 0x42),
    ),
    (
        "m.root-servers.net.",
        Ipv4Addr::new(202, 12, 27, 33),
        Ipv6Addr::new(0x2001, 0xdc3, 0, 0, 0, 0, 0, 0x35),
    ),
];

/// The bootstrap root delegation: hint addresses plus the configured root
/// DS set. Used before priming succeeds and as the fallback when it fails.
pub fn root_hint(root_dss: Vec<Ds>) -> Delegation {
    let ns_entries = ROOT_SERVERS
        .iter()
        .map(|(host, v4, v6)| NsEntry::WithAx(Arc::from(*host), vec![*v4], vec![*v6]))
        .collect();
    Delegation {
        zone: Arc::from("."),
        ns_entries,
        ds_state: DsState::FilledDs(root_dss),
        dnskeys: Vec::new(),
        fresh: Freshness::Cached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::dnssec::TrustAnchors;

    #[test]
    fn hint_has_thirteen_dual_stack_servers() {
        let hint = root_hint(TrustAnchors::compiled().root_dss().to_vec());
        assert_eq!(&*hint.zone, ".");
        assert_eq!(hint.ns_entries.len(), 13);
        assert!(hint
            .ns_entries
            .iter()
            .all(|e| matches!(e, NsEntry::WithAx(_, v4, v6) if !v4.is_empty() && !v6.is_empty())));
        assert!(hint.has_ds());
        assert!(!hint.is_signed());
        assert_eq!(hint.fresh, Freshness::Cached);
    }

    #[test]
    fn hint_hosts_are_canonical() {
        let hint = root_hint(Vec::new());
        for entry in &hint.ns_entries {
            let name = entry.name();
            assert!(name.ends_with(".root-servers.net."));
            assert_eq!(&**name, &name.to_ascii_lowercase());
        }
    }
}
