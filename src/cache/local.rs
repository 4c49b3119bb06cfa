use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::cv::CvDocument;

struct Slot {
    cv: CvDocument,
    expires_at: Instant,
}

/// Process-local memo of the last CV each user fetched or wrote.
///
/// One slot per user, no capacity bound and no LRU. Only the single-item
/// read paths consult it; listings always go to the store. A slot never
/// outlives the stored blob it was filled from.
#[derive(Clone, Default)]
pub struct LocalProfileCache {
    slots: Arc<RwLock<HashMap<i64, Slot>>>,
}

impl LocalProfileCache {
    /// Creates a new, empty `LocalProfileCache`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the user's last CV, if any and not yet expired.
    pub async fn get_last(&self, user_id: i64) -> Option<CvDocument> {
        let slots = self.slots.read().await;
        slots
            .get(&user_id)
            .filter(|slot| Instant::now() < slot.expires_at)
            .map(|slot| slot.cv.clone())
    }

    /// Overwrites the user's slot unconditionally. `expires_at` should be
    /// when the stored blob expires.
    pub async fn set_last(&self, user_id: i64, cv: CvDocument, expires_at: Instant) {
        self.slots.write().await.insert(user_id, Slot { cv, expires_at });
    }

    /// Drops the user's slot if it holds `profession`. Returns whether it did.
    pub async fn invalidate(&self, user_id: i64, profession: &str) -> bool {
        let mut slots = self.slots.write().await;
        let holds = slots
            .get(&user_id)
            .is_some_and(|slot| slot.cv.profession == profession);
        if holds {
            slots.remove(&user_id);
        }
        holds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;
    use std::time::Duration;

    fn in_a_week() -> Instant {
        Instant::now() + Duration::from_secs(7 * 24 * 3600)
    }

    #[tokio::test]
    async fn single_slot_per_user() {
        let cache = LocalProfileCache::new();
        assert_eq!(cache.get_last(3).await, None);

        cache.set_last(3, sample_cv(3, "cook"), in_a_week()).await;
        cache.set_last(3, sample_cv(3, "pilot"), in_a_week()).await;
        cache.set_last(9, sample_cv(9, "cook"), in_a_week()).await;

        assert_eq!(cache.get_last(3).await.unwrap().profession, "pilot");
        assert_eq!(cache.get_last(9).await.unwrap().profession, "cook");
    }

    #[tokio::test]
    async fn invalidate_only_matching_profession() {
        let cache = LocalProfileCache::new();
        cache.set_last(3, sample_cv(3, "pilot"), in_a_week()).await;

        assert!(!cache.invalidate(3, "cook").await);
        assert!(cache.get_last(3).await.is_some());

        assert!(cache.invalidate(3, "pilot").await);
        assert_eq!(cache.get_last(3).await, None);
    }

    #[tokio::test]
    async fn concurrent_users_do_not_interfere() {
        let cache = LocalProfileCache::new();
        let mut handles = Vec::new();
        for user in 0..32i64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set_last(user, sample_cv(user, "cook"), in_a_week()).await;
                cache.get_last(user).await.map(|cv| cv.owner_id)
            }));
        }
        for (user, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(user as i64));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slot_expires_with_its_blob() {
        let cache = LocalProfileCache::new();
        cache
            .set_last(3, sample_cv(3, "cook"), Instant::now() + Duration::from_secs(60))
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get_last(3).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get_last(3).await, None);
    }
}
