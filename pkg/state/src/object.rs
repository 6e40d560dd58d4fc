//! Typed JSON access on top of a [`KvStore`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::store::KvStore;

/// Fetch and decode the object at `key`. `Ok(None)` means not found.
pub async fn get_object<T, S>(store: &S, key: &str) -> anyhow::Result<Option<T>>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    match store.get(key).await? {
        Some(bytes) => {
            let obj = serde_json::from_slice(&bytes)
                .map_err(|e| anyhow::anyhow!("Failed to decode {}: {}", key, e))?;
            Ok(Some(obj))
        }
        None => Ok(None),
    }
}

/// Write `value` at `key`, replacing whatever was there.
pub async fn put_object<T, S>(store: &S, key: &str, value: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    S: KvStore + ?Sized,
{
    let data = serde_json::to_vec(value)?;
    store.put(key, &data).await
}

/// Decode every object under `prefix`, skipping entries that fail to decode.
pub async fn list_objects<T, S>(store: &S, prefix: &str) -> anyhow::Result<Vec<(String, T)>>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    let entries = store.list_prefix(prefix).await?;
    Ok(entries
        .into_iter()
        .filter_map(|(k, v)| match serde_json::from_slice(&v) {
            Ok(obj) => Some((k, obj)),
            Err(e) => {
                warn!("Skipping undecodable object {}: {}", k, e);
                None
            }
        })
        .collect())
}

const UPDATE_ATTEMPTS: usize = 5;

/// Read-modify-write of the object at `key` with retry on conflict.
///
/// `f` gets the current object (`None` when absent) and returns the object to
/// store, or `None` to leave the key alone. It may run more than once when a
/// concurrent writer gets in between. Returns what was written.
pub async fn update_object<T, S, F>(store: &S, key: &str, mut f: F) -> anyhow::Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
    S: KvStore + ?Sized,
    F: FnMut(Option<T>) -> Option<T>,
{
    for attempt in 1..=UPDATE_ATTEMPTS {
        let current = store.get(key).await?;
        let decoded = match &current {
            Some(bytes) => Some(
                serde_json::from_slice(bytes)
                    .map_err(|e| anyhow::anyhow!("Failed to decode {}: {}", key, e))?,
            ),
            None => None,
        };
        let Some(next) = f(decoded) else {
            return Ok(None);
        };
        let data = serde_json::to_vec(&next)?;
        if store
            .compare_and_swap(key, current.as_deref(), &data)
            .await?
        {
            return Ok(Some(next));
        }
        debug!("Conflict updating {} (attempt {})", key, attempt);
    }
    anyhow::bail!(
        "Gave up updating {} after {} conflicting writes",
        key,
        UPDATE_ATTEMPTS
    )
}
