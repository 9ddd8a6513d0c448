//! The cache store capability
//!
//! Named partitions of request → response entries. Every operation is
//! atomic per entry; concurrent writers to the same key resolve as
//! last-writer-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::key::RequestKey;
use crate::error::CacheError;
use crate::worker::response::CachedResponse;

pub type Result<T> = std::result::Result<T, CacheError>;

/// A response stored in a partition
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub response: CachedResponse,
    /// When the entry was written locally
    pub stored_at: DateTime<Utc>,
}

/// Size summary of a single partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStats {
    pub name: String,
    pub entries: usize,
    pub size_bytes: usize,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the partition if it does not exist yet
    async fn open(&self, partition: &str) -> Result<()>;

    /// All partition names, oldest first
    async fn partitions(&self) -> Result<Vec<String>>;

    /// Delete a partition and every entry in it
    async fn delete_partition(&self, partition: &str) -> Result<bool>;

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<StoredEntry>>;

    /// Store a response with an explicit local timestamp, creating the partition if needed
    async fn put_at(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &CachedResponse,
        stored_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool>;

    /// Request keys currently stored in a partition
    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>>;

    async fn stats(&self) -> Result<Vec<PartitionStats>>;

    /// Fingerprint of the worker definition last activated over `partition`
    async fn fingerprint(&self, partition: &str) -> Result<Option<String>>;

    /// Record the activated worker definition, creating the partition if needed
    async fn set_fingerprint(&self, partition: &str, fingerprint: &str) -> Result<()>;

    async fn put(&self, partition: &str, key: &RequestKey, response: &CachedResponse) -> Result<()> {
        self.put_at(partition, key, response, Utc::now()).await
    }

    async fn has_partition(&self, partition: &str) -> Result<bool> {
        Ok(self.partitions().await?.iter().any(|p| p == partition))
    }

    /// Look the request up in every partition, oldest partition first
    async fn match_any(&self, key: &RequestKey) -> Result<Option<StoredEntry>> {
        for partition in self.partitions().await? {
            if let Some(entry) = self.get(&partition, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
