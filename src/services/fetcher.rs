use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::cv::{CvDocument, ProfileKey};
use crate::repositories::profile::ProfileStore;

/// Capacity of the results channel. The caller drains it while workers run.
const RESULTS_BUFFER: usize = 16;

/// Assembles "all CVs owned by user X" by fanning lookups out over the
/// profile index.
///
/// At most `concurrency` lookups are in flight. Results arrive in no
/// particular order. A failing or empty lookup contributes nothing and never
/// aborts the batch.
#[derive(Clone)]
pub struct ConcurrentProfileFetcher {
    store: Arc<dyn ProfileStore>,
    concurrency: usize,
}

type KeyQueue = Arc<Mutex<std::vec::IntoIter<ProfileKey>>>;

impl ConcurrentProfileFetcher {
    pub fn new(store: Arc<dyn ProfileStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Lists every live CV whose `owner_id` is `user_id`.
    ///
    /// If `cancel` fires, this returns `AppError::Cancelled` right away. The
    /// workers notice the same token (or the dropped receiver) and stop; the
    /// coordinator still joins all of them.
    pub async fn list_owned(&self, user_id: i64, cancel: &CancellationToken) -> Result<Vec<CvDocument>> {
        let index = self.store.list_index().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(index.len());
        let candidates: Vec<ProfileKey> = index
            .into_iter()
            .map(|entry| entry.key)
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let workers = self.concurrency.min(candidates.len());
        tracing::debug!(
            "🔎 Fanning out {} candidate key(s) over {} worker(s) for user {}",
            candidates.len(),
            workers,
            user_id
        );

        let queue: KeyQueue = Arc::new(Mutex::new(candidates.into_iter()));
        let (tx, mut rx) = mpsc::channel(RESULTS_BUFFER);

        let mut lookups = JoinSet::new();
        for _ in 0..workers {
            lookups.spawn(lookup_worker(
                self.store.clone(),
                queue.clone(),
                tx.clone(),
                cancel.clone(),
                user_id,
            ));
        }
        drop(tx);

        // The channel closes once every worker has dropped its sender; this
        // task only surfaces panics and keeps the join independent of the
        // consumer below.
        tokio::spawn(async move {
            while let Some(joined) = lookups.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("❌ Profile lookup worker failed: {}", e);
                }
            }
        });

        let mut owned = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("⚠️ Listing for user {} cancelled after {} result(s)", user_id, owned.len());
                    return Err(AppError::Cancelled);
                }
                next = rx.recv() => match next {
                    Some(cv) => owned.push(cv),
                    None => break,
                },
            }
        }

        tracing::debug!("✅ Found {} CV(s) for user {}", owned.len(), user_id);
        Ok(owned)
    }
}

fn next_key(queue: &KeyQueue) -> Option<ProfileKey> {
    // a poisoned queue only means another worker panicked mid-pop
    match queue.lock() {
        Ok(mut keys) => keys.next(),
        Err(poisoned) => poisoned.into_inner().next(),
    }
}

async fn lookup_worker(
    store: Arc<dyn ProfileStore>,
    queue: KeyQueue,
    results: mpsc::Sender<CvDocument>,
    cancel: CancellationToken,
    user_id: i64,
) {
    while let Some(key) = next_key(&queue) {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = store.get(&key) => fetched,
        };

        let blob = match fetched {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::debug!("Stale index entry {}", key);
                continue;
            }
            Err(e) => {
                tracing::warn!("⚠️ Lookup of {} failed, skipping: {}", key, e);
                continue;
            }
        };

        let cv = match CvDocument::from_blob(&blob) {
            Ok(cv) => cv,
            Err(e) => {
                tracing::warn!("⚠️ Unreadable CV under {}, skipping: {}", key, e);
                continue;
            }
        };

        if cv.owner_id != user_id {
            continue;
        }

        if results.send(cv).await.is_err() {
            // receiver gone: the request stopped listening
            return;
        }
    }
}
