use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::models::cv::ProfileKey;

/// Redis list holding every known profile key, newest first.
pub const INDEX_KEY: &str = "cv:index";

/// Placeholder written over an index slot just before it is removed.
const TOMBSTONE: &str = "__cv_delisted__";

/// Replaces the slot at ARGV[1] with a tombstone and removes the tombstone
/// when that slot still holds ARGV[2]. If the list shifted underneath us, one
/// occurrence of ARGV[2] is removed by value instead.
const DELIST_SCRIPT: &str = r#"
local current = redis.call('LINDEX', KEYS[1], ARGV[1])
if current == ARGV[2] then
    redis.call('LSET', KEYS[1], ARGV[1], ARGV[3])
    return redis.call('LREM', KEYS[1], 1, ARGV[3])
end
return redis.call('LREM', KEYS[1], 1, ARGV[2])
"#;

/// One element of the profile index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Position in the index at the time it was listed.
    pub position: usize,
    pub key: ProfileKey,
}

/// Key-value store of serialized CVs plus the index of known keys.
///
/// The index is append-only from `put` and may list keys whose blobs have
/// already expired; `get` reports those as `None`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Upserts the blob under `key` with its own TTL and appends `key` to the
    /// index. The append is not deduplicated.
    async fn put(&self, key: &ProfileKey, blob: &str, ttl: Duration) -> Result<()>;

    /// Returns the blob, or `None` when it expired or was never written.
    async fn get(&self, key: &ProfileKey) -> Result<Option<String>>;

    /// Remaining lifetime of the blob under `key`, `None` once it is gone.
    async fn time_to_live(&self, key: &ProfileKey) -> Result<Option<Duration>>;

    /// The whole index, newest first, duplicates and stale keys included.
    async fn list_index(&self) -> Result<Vec<IndexEntry>>;

    /// Delists one occurrence of `key`, preferring the one at `position`.
    /// The blob is left to expire. Returns whether anything was removed.
    async fn remove(&self, position: usize, key: &ProfileKey) -> Result<bool>;
}

fn parse_index(raw: Vec<String>) -> Vec<IndexEntry> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match ProfileKey::parse(&entry) {
            Some(key) => Some(IndexEntry { position, key }),
            None => {
                tracing::warn!("⚠️ Skipping unrecognised index entry at {}: {}", position, entry);
                None
            }
        })
        .collect()
}

/// [`ProfileStore`] backed by Redis strings and a Redis list.
#[derive(Clone)]
pub struct RedisProfileStore {
    redis: ConnectionManager,
    delist: Arc<redis::Script>,
}

impl RedisProfileStore {
    /// Creates a new `RedisProfileStore` over a shared connection manager.
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            delist: Arc::new(redis::Script::new(DELIST_SCRIPT)),
        }
    }
}

#[async_trait]
impl ProfileStore for RedisProfileStore {
    async fn put(&self, key: &ProfileKey, blob: &str, ttl: Duration) -> Result<()> {
        let mut con = self.redis.clone();
        let storage_key = key.storage_key();

        let _: () = redis::pipe()
            .atomic()
            .set_ex(&storage_key, blob, ttl.as_secs().max(1))
            .ignore()
            .lpush(INDEX_KEY, &storage_key)
            .ignore()
            .query_async(&mut con)
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis SET/LPUSH failed for {}: {}", storage_key, e);
                e
            })?;

        tracing::debug!("✅ Stored {} (ttl {}s)", storage_key, ttl.as_secs());
        Ok(())
    }

    async fn get(&self, key: &ProfileKey) -> Result<Option<String>> {
        let mut con = self.redis.clone();
        let blob: Option<String> = con.get(key.storage_key()).await?;
        Ok(blob)
    }

    async fn time_to_live(&self, key: &ProfileKey) -> Result<Option<Duration>> {
        let mut con = self.redis.clone();
        // -2 missing, -1 no expiry; every blob is written with one
        let millis: i64 = con.pttl(key.storage_key()).await?;
        Ok((millis > 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn list_index(&self) -> Result<Vec<IndexEntry>> {
        let mut con = self.redis.clone();
        let raw: Vec<String> = con.lrange(INDEX_KEY, 0, -1).await?;
        Ok(parse_index(raw))
    }

    async fn remove(&self, position: usize, key: &ProfileKey) -> Result<bool> {
        let mut con = self.redis.clone();
        let removed: i64 = self
            .delist
            .key(INDEX_KEY)
            .arg(position as i64)
            .arg(key.storage_key())
            .arg(TOMBSTONE)
            .invoke_async(&mut con)
            .await?;

        tracing::debug!("🗑️ Delisted {} at {} (removed {})", key, position, removed);
        Ok(removed > 0)
    }
}

#[derive(Default)]
struct MemoryProfiles {
    blobs: HashMap<String, (String, Instant)>,
    index: VecDeque<String>,
}

/// In-process [`ProfileStore`] with the same TTL and index semantics as the
/// Redis one. Expiry follows the tokio clock.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    inner: Arc<Mutex<MemoryProfiles>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw entry to the index without storing a blob.
    pub async fn push_index_entry(&self, raw: &str) {
        self.inner.lock().await.index.push_front(raw.to_string());
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn put(&self, key: &ProfileKey, blob: &str, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let storage_key = key.storage_key();
        inner
            .blobs
            .insert(storage_key.clone(), (blob.to_string(), Instant::now() + ttl));
        inner.index.push_front(storage_key);
        Ok(())
    }

    async fn get(&self, key: &ProfileKey) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let storage_key = key.storage_key();

        let live = match inner.blobs.get(&storage_key) {
            Some((blob, expires_at)) if Instant::now() < *expires_at => Some(blob.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if live.is_none() {
            inner.blobs.remove(&storage_key);
        }
        Ok(live)
    }

    async fn time_to_live(&self, key: &ProfileKey) -> Result<Option<Duration>> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        Ok(inner
            .blobs
            .get(&key.storage_key())
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(_, expires_at)| *expires_at - now))
    }

    async fn list_index(&self) -> Result<Vec<IndexEntry>> {
        let inner = self.inner.lock().await;
        Ok(parse_index(inner.index.iter().cloned().collect()))
    }

    async fn remove(&self, position: usize, key: &ProfileKey) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let storage_key = key.storage_key();

        if inner.index.get(position) == Some(&storage_key) {
            inner.index.remove(position);
            return Ok(true);
        }

        match inner.index.iter().position(|entry| *entry == storage_key) {
            Some(found) => {
                inner.index.remove(found);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::{sample_cv, CvDocument};

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryProfileStore::new();
        let cv = sample_cv(3, "cook");

        store.put(&cv.key(), &cv.to_blob().unwrap(), WEEK).await.unwrap();
        let blob = store.get(&cv.key()).await.unwrap().expect("blob present");

        assert_eq!(CvDocument::from_blob(&blob).unwrap(), cv);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_blob_reads_as_empty_but_stays_indexed() {
        let store = MemoryProfileStore::new();
        let key = ProfileKey::new(3, "cook");

        store.put(&key, "{}", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get(&key).await.unwrap().is_some());
        assert_eq!(store.time_to_live(&key).await.unwrap(), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.time_to_live(&key).await.unwrap(), None);
        assert_eq!(store.list_index().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn index_keeps_duplicates_newest_first() {
        let store = MemoryProfileStore::new();
        let cook = ProfileKey::new(3, "cook");
        let pilot = ProfileKey::new(3, "pilot");

        store.put(&cook, "a", WEEK).await.unwrap();
        store.put(&cook, "b", WEEK).await.unwrap();
        store.put(&pilot, "c", WEEK).await.unwrap();

        let keys: Vec<ProfileKey> = store
            .list_index()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![pilot, cook.clone(), cook.clone()]);
        assert_eq!(store.get(&cook).await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn remove_prefers_position_then_falls_back_to_value() {
        let store = MemoryProfileStore::new();
        let cook = ProfileKey::new(3, "cook");
        let pilot = ProfileKey::new(3, "pilot");
        store.put(&cook, "a", WEEK).await.unwrap();
        store.put(&pilot, "b", WEEK).await.unwrap();

        // index: [pilot, cook]; position 0 is stale for cook
        assert!(store.remove(0, &cook).await.unwrap());
        let left = store.list_index().await.unwrap();
        assert_eq!(left, vec![IndexEntry { position: 0, key: pilot.clone() }]);

        assert!(store.remove(0, &pilot).await.unwrap());
        assert!(!store.remove(0, &pilot).await.unwrap());
        assert!(store.list_index().await.unwrap().is_empty());

        // delisting does not erase
        assert!(store.get(&cook).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unrecognised_entries_are_skipped_with_positions_kept() {
        let store = MemoryProfileStore::new();
        let cook = ProfileKey::new(9, "cook");
        store.put(&cook, "a", WEEK).await.unwrap();
        store.push_index_entry("legacy-cook").await;

        let entries = store.list_index().await.unwrap();
        assert_eq!(entries, vec![IndexEntry { position: 1, key: cook }]);
    }
}
