//! Accounts, credentials and cookie sessions.
//!
//! # Design
//! Request handlers only ever need "who is calling"; they receive an
//! [`Identity`] from the authentication gate and never touch credentials.
//! Accounts live behind the [`UserStore`] trait so they can share a database
//! with the todo store, while sessions are kept in process memory and keyed
//! by an opaque random id carried in the `sessionid` cookie.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

mod session;
mod users;

pub use session::{expired_session_cookie, session_cookie, SessionId, SESSION_COOKIE};
pub use users::{InMemoryUserStore, NewUser, PasswordHash, UserRecord, UserStore};
#[cfg(feature = "postgres")]
pub use users::PostgresUserStore;

use session::Session;

/// Minimum number of characters accepted for a new password.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated caller of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl From<&UserRecord> for Identity {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Please fill in all required fields.")]
    MissingFields,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Username already exists.")]
    UsernameTaken,

    #[error("Password must be at least 6 characters long.")]
    PasswordTooShort,

    #[error("user backend failure: {0}")]
    Backend(String),
}

/// Signup form contents, exactly as submitted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Registration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub struct IdentityProvider {
    users: Arc<dyn UserStore>,
    sessions: RwLock<HashMap<SessionId, Session>>,
    session_ttl: Duration,
}

impl IdentityProvider {
    pub fn new(users: Arc<dyn UserStore>, session_ttl: Duration) -> Self {
        Self {
            users,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        }
    }

    /// Create an account.
    ///
    /// # Errors
    /// Checks run in order: required fields, matching confirmation, unused
    /// username, password length.
    pub async fn register(&self, form: Registration) -> Result<Identity, IdentityError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let (Some(username), Some(password), Some(confirm)) = (
            non_empty(form.username),
            non_empty(form.password),
            non_empty(form.password_confirm),
        ) else {
            return Err(IdentityError::MissingFields);
        };

        if password != confirm {
            return Err(IdentityError::PasswordMismatch);
        }
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(IdentityError::UsernameTaken);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::PasswordTooShort);
        }

        let user = self
            .users
            .insert(NewUser {
                username,
                email: form.email.unwrap_or_default(),
                password: PasswordHash::new(&password),
            })
            .await?;
        info!(user_id = %user.id, username = %user.username, "account created");
        Ok(Identity::from(&user))
    }

    /// Check a username/password pair.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, IdentityError> {
        let user = self.users.find_by_username(username).await?;
        Ok(user
            .filter(|u| u.password.verify(password))
            .map(|u| Identity::from(&u)))
    }

    /// Open a session for `identity`.
    ///
    /// Expired sessions are swept first, so sessions abandoned without a
    /// logout do not pile up.
    pub async fn start_session(&self, identity: &Identity) -> SessionId {
        let id = SessionId::generate();
        let now = Utc::now();
        let session = Session {
            user_id: identity.user_id,
            expires_at: now + self.session_ttl,
        };
        let mut sessions = self.sessions.write().await;
        let swept = purge_expired(&mut sessions, now);
        sessions.insert(id, session);
        debug!(user_id = %identity.user_id, swept, "session started");
        id
    }

    /// Drop every expired session. Returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> usize {
        let swept = purge_expired(&mut *self.sessions.write().await, Utc::now());
        if swept > 0 {
            debug!(swept, "expired sessions purged");
        }
        swept
    }

    pub async fn end_session(&self, id: SessionId) {
        if self.sessions.write().await.remove(&id).is_some() {
            debug!("session ended");
        }
    }

    /// Resolve the session cookie on a request to an identity.
    ///
    /// Unknown ids, expired sessions and sessions whose account has gone
    /// away all resolve to `None`. Expired sessions are evicted.
    pub async fn current_identity(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError> {
        let Some(id) = session_cookie(headers) else {
            return Ok(None);
        };
        let user_id = {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(s) if s.expires_at > Utc::now() => Some(s.user_id),
                Some(_) => None,
                None => return Ok(None),
            }
        };
        let Some(user_id) = user_id else {
            self.sessions.write().await.remove(&id);
            return Ok(None);
        };
        Ok(self.users.find_by_id(user_id).await?.map(|u| Identity::from(&u)))
    }

    /// `Set-Cookie` value that installs `id` in the browser.
    pub fn session_set_cookie(&self, id: SessionId) -> String {
        format!(
            "{SESSION_COOKIE}={id}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
            self.session_ttl.num_seconds()
        )
    }
}

fn purge_expired(sessions: &mut HashMap<SessionId, Session>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| s.expires_at > now);
    before - sessions.len()
}

/// Header pair used by tests and clients to present a session.
pub fn cookie_header(id: SessionId) -> (header::HeaderName, String) {
    (header::COOKIE, format!("{SESSION_COOKIE}={id}"))
}
