use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;

use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// Registered accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Inserts a user. A taken email is a `Conflict`.
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User>;

    /// Finds a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// [`UserDirectory`] over the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    db: Pool,
}

impl PgUserDirectory {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let client = self.db.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (name, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, name, email, password_hash, created_at
                "#,
                &[&name, &email, &password_hash],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict("Email already registered".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;
        Ok(User::from(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.db.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, name, email, password_hash, created_at
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        Ok(row.as_ref().map(User::from))
    }
}

#[derive(Default)]
struct MemoryUsers {
    next_id: i64,
    by_email: HashMap<String, User>,
}

/// In-process [`UserDirectory`].
#[derive(Clone, Default)]
pub struct MemoryUserDirectory {
    inner: Arc<Mutex<MemoryUsers>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let mut inner = self.inner.lock().await;
        if inner.by_email.contains_key(email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.by_email.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.inner.lock().await.by_email.get(email).cloned())
    }
}
