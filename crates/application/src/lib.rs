//! rootward application layer: the ports through which outer layers drive
//! the resolver core.

pub mod ports;

pub use ports::{CacheRow, QueryControls, Reply, ResolverPort, RrCacheOps, TransportTag};
