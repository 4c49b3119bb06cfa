use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::IsolationLevel;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::session::{NewSession, SessionRecord},
};

/// Record of live sessions per user, bounded to `max_sessions` rows each.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Records a login. In one transaction: counts the user's rows, evicts
    /// the oldest so that at most `max_sessions - 1` remain, and inserts the
    /// new row. Fails as a whole with `SessionPersistenceFailed`.
    async fn record_session(&self, new: NewSession) -> Result<SessionRecord>;

    /// Whether the session row still exists.
    async fn is_active(&self, session_id: Uuid) -> Result<bool>;

    /// Moves a live session to a new id, keeping its age. Returns `false`
    /// if the old id is gone (evicted or revoked).
    async fn rotate(&self, old_id: Uuid, new_id: Uuid) -> Result<bool>;

    /// Deletes one session row.
    async fn revoke(&self, session_id: Uuid) -> Result<()>;

    /// The user's live sessions, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<SessionRecord>>;
}

fn persistence_failed(step: &'static str) -> impl Fn(tokio_postgres::Error) -> AppError {
    move |e| {
        tracing::error!("❌ Session transaction failed at {}: {}", step, e);
        AppError::SessionPersistenceFailed(format!("{}: {}", step, e))
    }
}

/// [`SessionLedger`] over the `sessions` table.
///
/// Isolation is READ COMMITTED with the count, evict and insert inside one
/// transaction. The user's row is locked `FOR UPDATE` first, which serializes
/// concurrent logins of the same user so neither can observe a stale count.
#[derive(Clone)]
pub struct PgSessionLedger {
    db: Pool,
    max_sessions: usize,
}

impl PgSessionLedger {
    pub fn new(db: Pool, max_sessions: usize) -> Self {
        Self { db, max_sessions }
    }
}

#[async_trait]
impl SessionLedger for PgSessionLedger {
    async fn record_session(&self, new: NewSession) -> Result<SessionRecord> {
        let mut client = self.db.get().await.map_err(|e| {
            tracing::error!("❌ No connection for session transaction: {}", e);
            AppError::SessionPersistenceFailed(e.to_string())
        })?;

        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::ReadCommitted)
            .start()
            .await
            .map_err(persistence_failed("begin"))?;

        tx.query_one("SELECT id FROM users WHERE id = $1 FOR UPDATE", &[&new.user_id])
            .await
            .map_err(persistence_failed("lock user"))?;

        let count: i64 = tx
            .query_one("SELECT COUNT(*) FROM sessions WHERE user_id = $1", &[&new.user_id])
            .await
            .map_err(persistence_failed("count"))?
            .get(0);

        if count as usize >= self.max_sessions {
            let keep = (self.max_sessions - 1) as i64;
            let evicted = tx
                .execute(
                    r#"
                    DELETE FROM sessions
                    WHERE id IN (
                        SELECT id FROM sessions
                        WHERE user_id = $1
                        ORDER BY created_at DESC, seq DESC
                        OFFSET $2
                    )
                    "#,
                    &[&new.user_id, &keep],
                )
                .await
                .map_err(persistence_failed("evict"))?;
            tracing::info!("🧹 Evicted {} oldest session(s) for user {}", evicted, new.user_id);
        }

        let row = tx
            .query_one(
                r#"
                INSERT INTO sessions (id, user_id, device_class, origin, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, user_id, device_class, origin, created_at
                "#,
                &[&new.id, &new.user_id, &new.device_class, &new.origin, &Utc::now()],
            )
            .await
            .map_err(persistence_failed("insert"))?;

        tx.commit().await.map_err(persistence_failed("commit"))?;

        let record = SessionRecord::from(&row);
        tracing::info!("✅ Session {} recorded for user {}", record.id, record.user_id);
        Ok(record)
    }

    async fn is_active(&self, session_id: Uuid) -> Result<bool> {
        let client = self.db.get().await?;
        let row = client
            .query_opt("SELECT 1 FROM sessions WHERE id = $1", &[&session_id])
            .await?;
        Ok(row.is_some())
    }

    async fn rotate(&self, old_id: Uuid, new_id: Uuid) -> Result<bool> {
        let client = self.db.get().await?;
        let updated = client
            .execute("UPDATE sessions SET id = $2 WHERE id = $1", &[&old_id, &new_id])
            .await?;
        Ok(updated == 1)
    }

    async fn revoke(&self, session_id: Uuid) -> Result<()> {
        let client = self.db.get().await?;
        client
            .execute("DELETE FROM sessions WHERE id = $1", &[&session_id])
            .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<SessionRecord>> {
        let client = self.db.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, user_id, device_class, origin, created_at
                FROM sessions
                WHERE user_id = $1
                ORDER BY created_at DESC, seq DESC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(SessionRecord::from).collect())
    }
}

/// In-process [`SessionLedger`]. Rows are kept in insertion order, which is
/// also their age order; the mutex plays the role of the transaction.
#[derive(Clone)]
pub struct MemorySessionLedger {
    rows: Arc<Mutex<Vec<SessionRecord>>>,
    max_sessions: usize,
}

impl MemorySessionLedger {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            max_sessions,
        }
    }
}

#[async_trait]
impl SessionLedger for MemorySessionLedger {
    async fn record_session(&self, new: NewSession) -> Result<SessionRecord> {
        let mut rows = self.rows.lock().await;

        let owned: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id == new.user_id)
            .map(|(i, _)| i)
            .collect();

        if owned.len() >= self.max_sessions {
            let evict = owned.len() + 1 - self.max_sessions;
            for i in owned.into_iter().take(evict).rev() {
                let gone = rows.remove(i);
                tracing::info!("🧹 Evicted session {} for user {}", gone.id, gone.user_id);
            }
        }

        let record = SessionRecord {
            id: new.id,
            user_id: new.user_id,
            device_class: new.device_class,
            origin: new.origin,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn is_active(&self, session_id: Uuid) -> Result<bool> {
        Ok(self.rows.lock().await.iter().any(|r| r.id == session_id))
    }

    async fn rotate(&self, old_id: Uuid, new_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|r| r.id == old_id) {
            Some(row) => {
                row.id = new_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke(&self, session_id: Uuid) -> Result<()> {
        self.rows.lock().await.retain(|r| r.id != session_id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<SessionRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().rev().filter(|r| r.user_id == user_id).cloned().collect())
    }
}
