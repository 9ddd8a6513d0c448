//! In-memory cache store for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::key::RequestKey;
use super::store::{CacheStore, PartitionStats, Result, StoredEntry};
use crate::worker::response::CachedResponse;

#[derive(Debug, Default)]
struct Partition {
    name: String,
    fingerprint: Option<String>,
    entries: BTreeMap<String, (RequestKey, StoredEntry)>,
}

impl Partition {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// `CacheStore` backed by a map behind a `RwLock`
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    partitions: RwLock<Vec<Partition>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(partitions: &mut Vec<Partition>, name: &str) -> usize {
        match partitions.iter().position(|p| p.name == name) {
            Some(i) => i,
            None => {
                partitions.push(Partition::new(name));
                partitions.len() - 1
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, partition: &str) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        if !partitions.iter().any(|p| p.name == partition) {
            partitions.push(Partition::new(partition));
        }
        Ok(())
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != partition);
        Ok(partitions.len() != before)
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<StoredEntry>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition)
            .and_then(|p| p.entries.get(&key.digest()))
            .map(|(_, entry)| entry.clone()))
    }

    async fn put_at(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &CachedResponse,
        stored_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        let index = Self::ensure(&mut partitions, partition);
        partitions[index].entries.insert(
            key.digest(),
            (
                key.clone(),
                StoredEntry {
                    response: response.clone(),
                    stored_at,
                },
            ),
        );
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions
            .iter_mut()
            .find(|p| p.name == partition)
            .map(|p| p.entries.remove(&key.digest()).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition)
            .map(|p| p.entries.values().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default())
    }

    async fn stats(&self) -> Result<Vec<PartitionStats>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .map(|p| PartitionStats {
                name: p.name.clone(),
                entries: p.entries.len(),
                size_bytes: p
                    .entries
                    .values()
                    .map(|(_, e)| e.response.body.len())
                    .sum(),
            })
            .collect())
    }

    async fn fingerprint(&self, partition: &str) -> Result<Option<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition)
            .and_then(|p| p.fingerprint.clone()))
    }

    async fn set_fingerprint(&self, partition: &str, fingerprint: &str) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        let index = Self::ensure(&mut partitions, partition);
        partitions[index].fingerprint = Some(fingerprint.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> CachedResponse {
        CachedResponse::new(200).with_body(body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("http://localhost/a");

        store.put("p1", &key, &ok("hello")).await.unwrap();

        let entry = store.get("p1", &key).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"hello");
        assert!(store.get("p2", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("http://localhost/a");

        store.put("p1", &key, &ok("one")).await.unwrap();
        store.put("p1", &key, &ok("two")).await.unwrap();

        assert_eq!(store.keys("p1").await.unwrap().len(), 1);
        let entry = store.get("p1", &key).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"two");
    }

    #[tokio::test]
    async fn test_partitions_keep_creation_order() {
        let store = MemoryCacheStore::new();
        store.open("b").await.unwrap();
        store.open("a").await.unwrap();
        store.open("b").await.unwrap();

        assert_eq!(store.partitions().await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_match_any_searches_all_partitions() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("http://localhost/x");
        store.open("first").await.unwrap();
        store.put("second", &key, &ok("found")).await.unwrap();

        let entry = store.match_any(&key).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"found");
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("http://localhost/x");
        store.put("old", &key, &ok("x")).await.unwrap();

        assert!(store.delete_partition("old").await.unwrap());
        assert!(!store.delete_partition("old").await.unwrap());
        assert!(store.match_any(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryCacheStore::new();
        store
            .put("p", &RequestKey::get("http://localhost/1"), &ok("12345"))
            .await
            .unwrap();
        store
            .put("p", &RequestKey::get("http://localhost/2"), &ok("678"))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].entries, 2);
        assert_eq!(stats[0].size_bytes, 8);
    }

    #[tokio::test]
    async fn test_fingerprint_dies_with_partition() {
        let store = MemoryCacheStore::new();
        assert!(store.fingerprint("p").await.unwrap().is_none());

        store.set_fingerprint("p", "abc").await.unwrap();
        assert_eq!(store.fingerprint("p").await.unwrap().as_deref(), Some("abc"));

        store.delete_partition("p").await.unwrap();
        assert!(store.fingerprint("p").await.unwrap().is_none());
    }
}
