// src/auth/mod.rs

//! Authentication adapter (SPEC_FULL §4.11). We do not implement LDAP;
//! `Authenticator` is the seam, `LocalAuthenticator` the one real
//! implementation, backed by the `users.password_hash` column (argon2).
//! Session tokens are opaque random values in the `sessions` table,
//! resolved by `server::auth_middleware` on every request.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::RngCore;
use rusqlite::OptionalExtension;

use crate::catalog::users;
use crate::db::Store;
use crate::domain::User;
use crate::error::{Error, Result};

/// Identity plus the session token issued for it.
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthenticatedUser>;
}

/// Hash a plaintext password for storage (user provisioning, not part of
/// the `Authenticator` trait since it is an administrative action).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Validation(format!("failed to hash password: {e}")))
}

const SESSION_TTL_HOURS: i64 = 12;

/// Verifies against the `users.password_hash` column and issues a
/// 256-bit random bearer token stored in `sessions`.
pub struct LocalAuthenticator {
    store: Arc<Store>,
}

impl LocalAuthenticator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn issue_session(&self, user_id: i64) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at = Utc::now() + ChronoDuration::hours(SESSION_TTL_HOURS);

        self.store.with_txn(|txn| {
            txn.execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![&token, user_id, expires_at.to_rfc3339()],
            )?;
            Ok(())
        })?;

        Ok(token)
    }

    /// Resolve a bearer token to its user, rejecting expired sessions.
    /// Used by `server::auth_middleware` on every request.
    pub fn resolve_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.store.connection()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at: chrono::DateTime<Utc> = expires_at
            .parse()
            .map_err(|e| Error::storage(format!("corrupt session expiry: {e}")))?;
        if expires_at < Utc::now() {
            return Ok(None);
        }

        users::find_by_id(&conn, user_id)
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthenticatedUser> {
        let username = username.to_string();
        let password = password.to_string();
        let store = self.store.clone();

        let (user, hash) = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = store.connection()?;
            users::find_credentials(&conn, &username)?
                .ok_or_else(|| Error::precondition("invalid username or password"))
        })
        .await
        .map_err(|e| Error::storage(format!("auth task join error: {e}")))??;

        if !user.is_active {
            return Err(Error::precondition("account is disabled"));
        }

        let parsed = PasswordHash::new(&hash)
            .map_err(|e| Error::storage(format!("corrupt password hash: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| Error::precondition("invalid username or password"))?;

        let token = self.issue_session(user.id)?;
        Ok(AuthenticatedUser { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewUser, Role};

    fn store_with_user(password: &str) -> Arc<Store> {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db.sqlite")).unwrap());
        let conn = store.connection().unwrap();
        let hash = hash_password(password).unwrap();
        users::insert(
            &conn,
            &NewUser { username: "jdoe".into(), display_name: "Jane".into(), email: "j@x".into(), role: Role::Artist },
            &hash,
        ).unwrap();
        store
    }

    #[tokio::test]
    async fn authenticate_succeeds_with_correct_password() {
        let store = store_with_user("hunter2");
        let auth = LocalAuthenticator::new(store);
        let result = auth.authenticate("jdoe", "hunter2").await.unwrap();
        assert_eq!(result.user.username, "jdoe");
        assert_eq!(result.token.len(), 64);
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let store = store_with_user("hunter2");
        let auth = LocalAuthenticator::new(store);
        let err = auth.authenticate("jdoe", "wrong").await;
        assert!(matches!(err, Err(Error::Precondition(_))));
    }

    #[tokio::test]
    async fn resolve_token_returns_user_for_valid_session() {
        let store = store_with_user("hunter2");
        let auth = LocalAuthenticator::new(store);
        let result = auth.authenticate("jdoe", "hunter2").await.unwrap();

        let resolved = auth.resolve_token(&result.token).unwrap().unwrap();
        assert_eq!(resolved.username, "jdoe");

        assert!(auth.resolve_token("not-a-real-token").unwrap().is_none());
    }
}
