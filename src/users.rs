/// User identity store
///
/// Supplies `(id, email, password_hash)` to the login flow and persists new
/// accounts at registration. The auth core never sees the store itself.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::HashedCredential;
use crate::error::DatabaseError;

/// Account data accepted at registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: HashedCredential,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: HashedCredential,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Storage seam for user accounts
///
/// Object safe so the HTTP layer can hold `web::Data<dyn UserStore>`.
pub trait UserStore: Send + Sync {
    /// # Errors
    /// `UniqueConstraintViolation` if the email is already registered
    fn insert(&self, user: NewUser) -> BoxFuture<'_, Result<UserRecord, DatabaseError>>;

    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DatabaseError>>;

    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRecord>, DatabaseError>>;
}

type UserRow = (Uuid, String, String, Option<String>, Option<String>, DateTime<Utc>);

fn from_row(row: UserRow) -> UserRecord {
    let (id, email, password_hash, first_name, last_name, created_at) = row;
    UserRecord {
        id,
        email,
        password_hash: HashedCredential::new(password_hash),
        first_name,
        last_name,
        created_at,
    }
}

/// Postgres-backed store (`users` table, see `migrations/`)
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserStore for PgUserStore {
    fn insert(&self, user: NewUser) -> BoxFuture<'_, Result<UserRecord, DatabaseError>> {
        async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (id, email, password_hash, first_name, last_name, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, email, password_hash, first_name, last_name, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(user.password_hash.as_str())
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

            Ok(from_row(row))
        }
        .boxed()
    }

    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DatabaseError>> {
        async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(from_row))
        }
        .boxed()
    }

    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRecord>, DatabaseError>> {
        async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(from_row))
        }
        .boxed()
    }
}

/// Process-local store for tests and database-less runs
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_sync(&self, user: NewUser) -> Result<UserRecord, DatabaseError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| DatabaseError::ConnectionPool("user store lock poisoned".to_string()))?;

        if users.values().any(|existing| existing.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: Utc::now(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_sync(
        &self,
        predicate: impl Fn(&UserRecord) -> bool,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let users = self
            .users
            .read()
            .map_err(|_| DatabaseError::ConnectionPool("user store lock poisoned".to_string()))?;
        Ok(users.values().find(|user| predicate(*user)).cloned())
    }
}

impl UserStore for InMemoryUserStore {
    fn insert(&self, user: NewUser) -> BoxFuture<'_, Result<UserRecord, DatabaseError>> {
        future::ready(self.insert_sync(user)).boxed()
    }

    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DatabaseError>> {
        future::ready(self.find_sync(|user| user.email == email)).boxed()
    }

    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRecord>, DatabaseError>> {
        future::ready(self.find_sync(|user| user.id == id)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: HashedCredential::new("$2b$04$placeholder"),
            first_name: Some("Ada".to_string()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();

        let created = store.insert(new_user("ada@example.com")).await.unwrap();
        let by_email = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "ada@example.com");
        assert_eq!(by_id.first_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("ada@example.com")).await.unwrap();

        let result = store.insert(new_user("ada@example.com")).await;

        assert!(matches!(
            result,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = InMemoryUserStore::new();

        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
