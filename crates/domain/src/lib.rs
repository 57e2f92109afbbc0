//! rootward domain layer: value types shared across the resolver core.

pub mod config;
pub mod errors;
pub mod name;
pub mod ranking;

pub use config::{Config, ConfigError, LoggingConfig, ResolverConfig, TrustAnchorEntry};
pub use errors::{DnsError, RcodeHint, VerifyError};
pub use ranking::Ranking;
