use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{local::LocalProfileCache, ownership::OwnershipIndex};
use crate::error::{AppError, Result};
use crate::models::cv::{CvDocument, NewCv};
use crate::repositories::profile::ProfileStore;
use crate::services::fetcher::ConcurrentProfileFetcher;
use crate::validation::auth::validate_profession;

/// CV create/list/read/delete over the profile store and its caches.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    fetcher: ConcurrentProfileFetcher,
    local: LocalProfileCache,
    cv_ttl: Duration,
    fetch_timeout: Duration,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    ///
    /// # Arguments
    ///
    /// * `store` - The shared profile store.
    /// * `local` - The process-local last-CV cache.
    /// * `cv_ttl` - Lifetime of each stored CV.
    /// * `fetch_concurrency` - Cap on in-flight lookups per listing.
    /// * `fetch_timeout` - How long a listing waits for its fan-out.
    pub fn new(
        store: Arc<dyn ProfileStore>,
        local: LocalProfileCache,
        cv_ttl: Duration,
        fetch_concurrency: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher: ConcurrentProfileFetcher::new(store.clone(), fetch_concurrency),
            store,
            local,
            cv_ttl,
            fetch_timeout,
        }
    }

    /// Stores a new CV for `owner_id` and remembers it as their last one.
    pub async fn create(&self, owner_id: i64, input: NewCv) -> Result<CvDocument> {
        validate_profession(&input.profession)?;

        let cv = input.into_document(owner_id);
        let blob = cv.to_blob()?;
        let expires_at = Instant::now() + self.cv_ttl;
        self.store.put(&cv.key(), &blob, self.cv_ttl).await?;
        self.local.set_last(owner_id, cv.clone(), expires_at).await;

        tracing::info!("✅ CV '{}' stored for user {}", cv.profession, owner_id);
        Ok(cv)
    }

    /// Every live CV owned by `user_id`, sorted by profession.
    ///
    /// The fan-out is tied to this call: if the caller goes away or the
    /// timeout passes, the workers are cancelled.
    pub async fn list_owned(&self, user_id: i64) -> Result<Vec<CvDocument>> {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        let mut owned = tokio::time::timeout(self.fetch_timeout, self.fetcher.list_owned(user_id, &cancel))
            .await
            .map_err(|_| AppError::Cancelled)??;

        owned.sort_by(|a, b| a.profession.cmp(&b.profession));
        Ok(owned)
    }

    /// Reads one CV, trying the local cache before the listing.
    ///
    /// A miss resolves against what `list_owned` currently sees, so a
    /// delisted or expired CV is `NotFound` even while its blob lingers,
    /// and another owner's CV under the same profession is never returned.
    pub async fn get_one(&self, user_id: i64, profession: &str) -> Result<CvDocument> {
        if let Some(cv) = self.local.get_last(user_id).await {
            if cv.profession == profession {
                tracing::debug!("⚡ Local cache hit for user {} / {}", user_id, profession);
                return Ok(cv);
            }
        }

        let mut ownership = OwnershipIndex::new(self.list_owned(user_id).await?);
        let cv = ownership
            .find(user_id, profession)
            .cloned()
            .ok_or(AppError::NotFound)?;

        let key = cv.key();
        match self
            .store
            .time_to_live(&key)
            .await
            .map_err(|e| AppError::StoreLookupFailed(format!("{}: {}", key, e)))?
        {
            Some(remaining) => {
                self.local
                    .set_last(user_id, cv.clone(), Instant::now() + remaining)
                    .await
            }
            None => tracing::debug!("⏳ {} expired while being read, not caching", key),
        }
        Ok(cv)
    }

    /// Deletes the caller's CV under `profession`.
    ///
    /// Ownership is checked against a fresh listing. Every index occurrence
    /// of the key is delisted; the blob itself is left to expire.
    pub async fn delete(&self, user_id: i64, profession: &str) -> Result<CvDocument> {
        let mut ownership = OwnershipIndex::new(self.list_owned(user_id).await?);
        let removed = ownership.take(user_id, profession).ok_or(AppError::NotFound)?;
        let key = removed.key();

        let positions: Vec<usize> = self
            .store
            .list_index()
            .await?
            .into_iter()
            .filter(|entry| entry.key == key)
            .map(|entry| entry.position)
            .collect();

        // back to front, so earlier positions stay valid
        let mut delisted = 0;
        for position in positions.into_iter().rev() {
            if self.store.remove(position, &key).await? {
                delisted += 1;
            }
        }

        self.local.invalidate(user_id, profession).await;

        tracing::info!("🗑️ CV '{}' of user {} delisted ({} index entries)", profession, user_id, delisted);
        Ok(removed)
    }
}
