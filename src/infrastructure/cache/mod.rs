//! In-memory index of resized artifacts.
//!
//! - [`RecencyList`]: arena-backed doubly-linked list of keys
//! - [`BoundedLruCache`]: map + recency list under a single lock

mod lru_cache;
mod recency_list;

pub use lru_cache::{BoundedLruCache, CacheStats, InvariantViolation};
pub use recency_list::{NodeId, RecencyList};
