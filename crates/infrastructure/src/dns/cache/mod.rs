pub mod entry;
pub mod key;
pub mod rrset;
pub mod storage;

pub use entry::{CacheEntry, Hit};
pub use key::{canonical_owner, Question, ERR_RTYPE};
pub use rrset::{group_rrsets, PendingRrset, Rrset, RrsetError};
pub use storage::{CachedAnswer, DumpEntry, RankedCache};
