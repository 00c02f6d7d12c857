use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use constant_time_eq::constant_time_eq;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::{IdentityError, UserId};

/// Stretched, salted SHA-256 digest of a password.
///
/// The first round hashes `salt || password`; every further round hashes
/// the previous digest with the salt and password again. The round count is
/// stored with the hash so it can be raised without invalidating accounts.
#[derive(Clone)]
pub struct PasswordHash {
    iterations: u32,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl PasswordHash {
    const SALT_LEN: usize = 16;

    /// Rounds used for newly created hashes.
    pub const ITERATIONS: u32 = 100_000;

    pub fn new(password: &str) -> Self {
        let mut salt = vec![0u8; Self::SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::stretch(Self::ITERATIONS, &salt, password);
        Self {
            iterations: Self::ITERATIONS,
            salt,
            digest,
        }
    }

    /// Rebuild a hash loaded from storage.
    pub fn from_parts(iterations: u32, salt: Vec<u8>, digest: Vec<u8>) -> Self {
        Self {
            iterations,
            salt,
            digest,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn digest_bytes(&self) -> &[u8] {
        &self.digest
    }

    pub fn verify(&self, password: &str) -> bool {
        constant_time_eq(&Self::stretch(self.iterations, &self.salt, password), &self.digest)
    }

    fn stretch(iterations: u32, salt: &[u8], password: &str) -> Vec<u8> {
        let mut digest = Sha256::new().chain_update(salt).chain_update(password).finalize();
        for _ in 1..iterations {
            digest = Sha256::new()
                .chain_update(digest)
                .chain_update(salt)
                .chain_update(password)
                .finalize();
        }
        digest.to_vec()
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password: PasswordHash,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: PasswordHash,
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, IdentityError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityError>;

    /// # Errors
    /// `UsernameTaken` if the username is already in use.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, IdentityError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, IdentityError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, IdentityError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(IdentityError::UsernameTaken);
        }
        let record = UserRecord {
            id: UserId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
            username: user.username,
            email: user.email,
            password: user.password,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }
}

#[cfg(feature = "postgres")]
pub use self::postgres::PostgresUserStore;

#[cfg(feature = "postgres")]
mod postgres {
    use async_trait::async_trait;
    use sqlx::PgPool;

    use super::{IdentityError, NewUser, PasswordHash, UserId, UserRecord, UserStore};

    type UserRow = (i64, String, String, i32, Vec<u8>, Vec<u8>);

    fn from_row((id, username, email, iterations, salt, digest): UserRow) -> UserRecord {
        UserRecord {
            id: UserId(id),
            username,
            email,
            password: PasswordHash::from_parts(u32::try_from(iterations).unwrap_or(1), salt, digest),
        }
    }

    fn backend(err: sqlx::Error) -> IdentityError {
        tracing::error!(error = %err, "user query failed");
        IdentityError::Backend(err.to_string())
    }

    #[derive(Clone, Debug)]
    pub struct PostgresUserStore {
        pool: PgPool,
    }

    impl PostgresUserStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        /// Create the `users` table if it is missing.
        pub async fn migrate(&self) -> Result<(), IdentityError> {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    username VARCHAR(150) NOT NULL UNIQUE,
                    email VARCHAR(254) NOT NULL DEFAULT '',
                    password_iterations INTEGER NOT NULL DEFAULT 1,
                    password_salt BYTEA NOT NULL,
                    password_digest BYTEA NOT NULL
                )",
            )
            .execute(&self.pool)
            .await
            .map_err(backend)?;
            sqlx::query(
                "ALTER TABLE users ADD COLUMN IF NOT EXISTS password_iterations INTEGER NOT NULL DEFAULT 1",
            )
            .execute(&self.pool)
            .await
            .map_err(backend)?;
            Ok(())
        }
    }

    #[async_trait]
    impl UserStore for PostgresUserStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, IdentityError> {
            let row: Option<UserRow> = sqlx::query_as(
                "SELECT id, username, email, password_iterations, password_salt, password_digest FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            Ok(row.map(from_row))
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityError> {
            let row: Option<UserRow> = sqlx::query_as(
                "SELECT id, username, email, password_iterations, password_salt, password_digest FROM users WHERE id = $1",
            )
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            Ok(row.map(from_row))
        }

        async fn insert(&self, user: NewUser) -> Result<UserRecord, IdentityError> {
            let row: Option<UserRow> = sqlx::query_as(
                "INSERT INTO users (username, email, password_iterations, password_salt, password_digest)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (username) DO NOTHING
                 RETURNING id, username, email, password_iterations, password_salt, password_digest",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(i32::try_from(user.password.iterations()).unwrap_or(i32::MAX))
            .bind(user.password.salt())
            .bind(user.password.digest_bytes())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            row.map(from_row).ok_or(IdentityError::UsernameTaken)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        // Run with: DATABASE_URL=postgres://... cargo test --features postgres -- --ignored
        async fn store() -> PostgresUserStore {
            let url = std::env::var("DATABASE_URL").unwrap();
            let store = PostgresUserStore::new(PgPool::connect(&url).await.unwrap());
            store.migrate().await.unwrap();
            store
        }

        fn new_user(username: &str) -> NewUser {
            NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: PasswordHash::new("secret1"),
            }
        }

        #[tokio::test]
        #[ignore] // Requires Postgres at DATABASE_URL
        async fn duplicate_username_is_taken() {
            let store = store().await;
            let username = format!("user-{}", uuid::Uuid::new_v4().simple());

            let first = store.insert(new_user(&username)).await.unwrap();
            let err = store.insert(new_user(&username)).await.unwrap_err();
            assert_eq!(err, IdentityError::UsernameTaken);

            let found = store.find_by_username(&username).await.unwrap().unwrap();
            assert_eq!(found.id, first.id);
        }

        #[tokio::test]
        #[ignore] // Requires Postgres at DATABASE_URL
        async fn stored_hash_still_verifies() {
            let store = store().await;
            let username = format!("user-{}", uuid::Uuid::new_v4().simple());
            let created = store.insert(new_user(&username)).await.unwrap();

            let loaded = store.find_by_id(created.id).await.unwrap().unwrap();
            assert_eq!(loaded.username, username);
            assert_eq!(loaded.password.iterations(), PasswordHash::ITERATIONS);
            assert!(loaded.password.verify("secret1"));
            assert!(!loaded.password.verify("secret2"));
        }
    }
}
