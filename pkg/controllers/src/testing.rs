//! Store doubles for controller tests.

use async_trait::async_trait;
use pkg_state::memory::MemoryStore;
use pkg_state::store::KvStore;
use std::sync::Mutex;

/// Fails every operation on keys under `prefix`, like a backend that is
/// unreachable for part of the keyspace.
pub struct FailingStore {
    pub inner: MemoryStore,
    prefix: String,
}

impl FailingStore {
    pub fn new(inner: MemoryStore, prefix: &str) -> Self {
        Self {
            inner,
            prefix: prefix.to_string(),
        }
    }

    fn check(&self, key: &str) -> anyhow::Result<()> {
        if key.starts_with(&self.prefix) || self.prefix.starts_with(key) {
            anyhow::bail!("backend unavailable for {}", key);
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FailingStore {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.check(key)?;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<bool> {
        self.check(key)?;
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        self.check(prefix)?;
        self.inner.list_prefix(prefix).await
    }
}

/// Applies one queued foreign write right before the next swap on its key,
/// as if another writer got in between our read and our write.
pub struct InterleavedStore {
    pub inner: MemoryStore,
    pending: Mutex<Option<(String, Vec<u8>)>>,
}

impl InterleavedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    pub fn queue_write<T: serde::Serialize>(&self, key: &str, value: &T) {
        let bytes = serde_json::to_vec(value).unwrap();
        *self.pending.lock().unwrap() = Some((key.to_string(), bytes));
    }

    fn take_for(&self, key: &str) -> Option<Vec<u8>> {
        let mut pending = self.pending.lock().unwrap();
        match pending.as_ref() {
            Some((k, _)) if k == key => pending.take().map(|(_, v)| v),
            _ => None,
        }
    }
}

#[async_trait]
impl KvStore for InterleavedStore {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<bool> {
        if let Some(foreign) = self.take_for(key) {
            self.inner.put(key, &foreign).await?;
        }
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        self.inner.list_prefix(prefix).await
    }
}
