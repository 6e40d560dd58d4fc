use async_trait::async_trait;

/// Key-value operations the controllers need from a state backend.
///
/// A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Write `value` only if the key still holds `expected` (`None` meaning
    /// absent). Returns `false` without writing when it does not.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<bool>;

    /// All key-value pairs whose keys start with `prefix`, in key order.
    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>>;
}
