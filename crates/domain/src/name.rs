//! Domain-name grammar and canonical form.
//!
//! Names are kept as lowercase strings with a trailing root dot. All
//! comparisons elsewhere in the system assume this form, so every external
//! name passes through [`canonicalize`] exactly once at the boundary.

use crate::errors::DnsError;
use std::sync::Arc;

/// Longest accepted presentation form without the trailing dot.
const MAX_NAME_LEN: usize = 253;
/// Longest accepted label.
const MAX_LABEL_LEN: usize = 63;

/// Canonical root name.
pub const ROOT: &str = ".";

/// Validate a query name and return its canonical form: lowercase, trailing
/// root dot.
///
/// Rejected inputs: empty names, names without any dot, labels longer than
/// 63 octets or empty, overall length beyond 253 octets (trailing dot not
/// counted), and the characters `:` and `/` which indicate an address or URL
/// was passed where a host name was expected.
pub fn canonicalize(input: &str) -> Result<Arc<str>, DnsError> {
    if input.is_empty() {
        return Err(DnsError::IllegalDomain("empty name".to_string()));
    }
    if input == "." {
        return Ok(Arc::from("."));
    }
    if !input.contains('.') {
        return Err(DnsError::IllegalDomain(format!(
            "not a fully qualified name: {input}"
        )));
    }
    if input.contains(':') || input.contains('/') {
        return Err(DnsError::IllegalDomain(format!(
            "illegal character in name: {input}"
        )));
    }

    let stripped = input.strip_suffix('.').unwrap_or(input);
    if stripped.len() > MAX_NAME_LEN {
        return Err(DnsError::IllegalDomain(format!(
            "name exceeds {MAX_NAME_LEN} octets: {input}"
        )));
    }
    for label in stripped.split('.') {
        if label.is_empty() {
            return Err(DnsError::IllegalDomain(format!("empty label: {input}")));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DnsError::IllegalDomain(format!(
                "label exceeds {MAX_LABEL_LEN} octets: {input}"
            )));
        }
    }

    let mut canonical = stripped.to_ascii_lowercase();
    canonical.push('.');
    Ok(Arc::from(canonical))
}

/// All super-domains of a canonical name, top-down, the name itself
/// included and the root excluded.
///
/// `www.example.com.` yields `["com.", "example.com.", "www.example.com."]`.
pub fn super_domains(name: &str) -> Vec<Arc<str>> {
    if name == "." {
        return Vec::new();
    }
    let stripped = name.strip_suffix('.').unwrap_or(name);
    let labels: Vec<&str> = stripped.split('.').collect();
    let mut out = Vec::with_capacity(labels.len());
    for start in (0..labels.len()).rev() {
        let mut domain = labels[start..].join(".");
        domain.push('.');
        out.push(Arc::from(domain));
    }
    out
}

/// Immediate parent of a canonical name; `None` for the root.
pub fn parent(name: &str) -> Option<Arc<str>> {
    if name == "." {
        return None;
    }
    let stripped = name.strip_suffix('.').unwrap_or(name);
    match stripped.split_once('.') {
        Some((_, rest)) => {
            let mut parent = rest.to_string();
            parent.push('.');
            Some(Arc::from(parent))
        }
        None => Some(Arc::from(".")),
    }
}

/// Whether `child` is a strict sub-domain of `parent` (both canonical).
pub fn is_strict_subdomain(child: &str, parent: &str) -> bool {
    if child == parent {
        return false;
    }
    if parent == "." {
        return child != ".";
    }
    child.ends_with(parent) && child.as_bytes()[child.len() - parent.len() - 1] == b'.'
}

/// Whether `name` lies at or below `zone` (both canonical).
pub fn in_zone(name: &str, zone: &str) -> bool {
    name == zone || is_strict_subdomain(name, zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases_and_appends_root() {
        assert_eq!(&*canonicalize("WWW.Example.COM").unwrap(), "www.example.com.");
        assert_eq!(&*canonicalize("example.com.").unwrap(), "example.com.");
        assert_eq!(&*canonicalize(".").unwrap(), ".");
    }

    #[test]
    fn canonicalize_rejects_bad_grammar() {
        assert!(canonicalize("").is_err());
        assert!(canonicalize("localhost").is_err());
        assert!(canonicalize("a..b.com").is_err());
        assert!(canonicalize("fe80::1").is_err());
        assert!(canonicalize("example.com/path").is_err());

        let long_label = format!("{}.com", "a".repeat(64));
        assert!(canonicalize(&long_label).is_err());

        let long_name = format!("{}.com", "a.".repeat(130));
        assert!(canonicalize(&long_name).is_err());
    }

    #[test]
    fn canonicalize_accepts_boundary_lengths() {
        let label63 = format!("{}.com", "a".repeat(63));
        assert!(canonicalize(&label63).is_ok());

        // 63 + 1 + 63 + 1 + 63 + 1 + 61 = 253 octets
        let name253 = format!(
            "{}.{}.{}.{}",
            "a".repeat(63),
            "b".repeat(63),
            "c".repeat(63),
            "d".repeat(61)
        );
        assert_eq!(name253.len(), 253);
        assert!(canonicalize(&name253).is_ok());
    }

    #[test]
    fn super_domains_walk_top_down() {
        let domains = super_domains("www.example.com.");
        let expected: Vec<&str> = vec!["com.", "example.com.", "www.example.com."];
        let got: Vec<&str> = domains.iter().map(|d| &**d).collect();
        assert_eq!(got, expected);

        assert!(super_domains(".").is_empty());
        let com_domains = super_domains("com.");
        let tld: Vec<&str> = com_domains.iter().map(|d| &**d).collect();
        assert_eq!(tld, vec!["com."]);
    }

    #[test]
    fn parent_walks_one_label() {
        assert_eq!(parent("www.example.com.").as_deref(), Some("example.com."));
        assert_eq!(parent("com.").as_deref(), Some("."));
        assert_eq!(parent("."), None);
    }

    #[test]
    fn subdomain_checks_respect_label_boundaries() {
        assert!(is_strict_subdomain("www.example.com.", "example.com."));
        assert!(is_strict_subdomain("example.com.", "com."));
        assert!(is_strict_subdomain("example.com.", "."));
        assert!(!is_strict_subdomain("example.com.", "example.com."));
        assert!(!is_strict_subdomain("notexample.com.", "example.com."));
        assert!(in_zone("example.com.", "example.com."));
    }
}
