use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expiry| expiry < Instant::now())
    }
}

/// In-memory collection that lives as long as its store
#[derive(Default)]
pub struct MemoryCollection {
    inner: Mutex<BTreeMap<Vec<u8>, CacheValue>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!("Cache entry expired for key: {}", String::from_utf8_lossy(key));
                cache.remove(key);
                None
            }
            Some(entry) => {
                debug!("Cache HIT for key: {}", String::from_utf8_lossy(key));
                Some(entry.value.clone())
            }
            None => {
                debug!("Cache MISS for key: {}", String::from_utf8_lossy(key));
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {}", String::from_utf8_lossy(key));
        cache.insert(
            key.to_vec(),
            CacheValue {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut cache = self.inner.lock().await;
        Ok(cache.remove(key).is_some())
    }

    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut cache = self.inner.lock().await;
        cache.retain(|_, entry| !entry.is_expired());
        Ok(cache
            .iter()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect())
    }
}
