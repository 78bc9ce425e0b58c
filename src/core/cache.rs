use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named, byte-oriented key-value collection with optional expiry.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Returns whether the key was present.
    async fn remove(&self, key: &[u8]) -> Result<bool>;

    /// All live entries ordered by key.
    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

pub trait Store: Send + Sync {
    /// Looks up a collection by name. Persistent collections are backed by
    /// disk and survive restarts; others live only as long as the store.
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
