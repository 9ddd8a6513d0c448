//! Versioned response cache
//!
//! Named partitions of request → response entries, persisted in SQLite so
//! the cache outlives the process that filled it.

pub mod key;
#[cfg(test)]
pub mod memory;
pub mod storage;
pub mod store;

pub use key::RequestKey;
#[cfg(test)]
pub use memory::MemoryCacheStore;
pub use storage::CacheStorage;
pub use store::{CacheStore, PartitionStats, StoredEntry};
