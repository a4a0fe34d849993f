use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{RegisterRequest, Session, User};

const MIN_PASSWORD_LEN: usize = 6;

/// External-auth seam. The HTTP layer only ever talks to this trait, so the
/// backing identity store can be swapped without touching the handlers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, req: RegisterRequest) -> Result<(User, Session), AppError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<(User, Session), AppError>;
    async fn sign_out(&self, token: &str) -> Result<(), AppError>;
    async fn current_session(&self, token: &str) -> Result<Option<(User, Session)>, AppError>;
}

/// Provider backed by the application's own sqlite database: salted SHA-256
/// password digests, opaque uuid session tokens with a TTL.
pub struct SqliteAuthProvider {
    db: SqlitePool,
    session_ttl_days: i64,
}

impl SqliteAuthProvider {
    pub fn new(db: SqlitePool, session_ttl_days: i64) -> Self {
        Self {
            db,
            session_ttl_days,
        }
    }
}

#[async_trait]
impl AuthProvider for SqliteAuthProvider {
    async fn sign_up(&self, req: RegisterRequest) -> Result<(User, Session), AppError> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        let username = req.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if repository::find_user_by_email(&self.db, &email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let digest = salted_digest(&req.password);
        let user = match repository::insert_user(&self.db, &email, username, &digest).await {
            Ok(user) => user,
            // Lost the race against a concurrent sign_up for the same email.
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let session = repository::insert_session(&self.db, &user.id, self.session_ttl_days).await?;
        Ok((user, session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(User, Session), AppError> {
        let email = email.trim().to_lowercase();
        let record = repository::find_user_by_email(&self.db, &email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_digest(&record.password_digest, password) {
            return Err(AppError::Unauthorized);
        }

        let user = record.into_user();
        let session = repository::insert_session(&self.db, &user.id, self.session_ttl_days).await?;
        Ok((user, session))
    }

    async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        // Idempotent: signing out an unknown or expired token is not an error.
        repository::delete_session(&self.db, token).await?;
        Ok(())
    }

    async fn current_session(&self, token: &str) -> Result<Option<(User, Session)>, AppError> {
        let session = match repository::find_session(&self.db, token).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        if is_expired(&session) {
            repository::delete_session(&self.db, token).await?;
            return Ok(None);
        }

        match repository::find_user_by_id(&self.db, &session.user_id).await? {
            Some(user) => Ok(Some((user, session))),
            None => {
                warn!("session {} points at a missing user", session.token);
                Ok(None)
            }
        }
    }
}

fn is_expired(session: &Session) -> bool {
    match DateTime::parse_from_rfc3339(&session.expires_at) {
        Ok(expires_at) => expires_at.with_timezone(&Utc) <= Utc::now(),
        // An unparseable expiry is treated as expired rather than eternal.
        Err(_) => true,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn salted_digest(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, hex_sha256(&salt, password))
}

fn verify_digest(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => hex_sha256(salt, password) == digest,
        None => false,
    }
}

fn hex_sha256(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter22".to_string(),
            username: "tester".to_string(),
        }
    }

    async fn setup_provider() -> SqliteAuthProvider {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        SqliteAuthProvider::new(pool, 30)
    }

    #[test]
    fn digest_verifies_and_rejects() {
        let stored = salted_digest("secret-password");
        assert!(verify_digest(&stored, "secret-password"));
        assert!(!verify_digest(&stored, "wrong-password"));
        assert!(!verify_digest("garbage-without-salt", "secret-password"));
    }

    #[test]
    fn digests_are_salted() {
        assert_ne!(salted_digest("same"), salted_digest("same"));
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let provider = setup_provider().await;

        let (user, session) = provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect("sign_up failed");
        assert_eq!(user.email, "a@example.com");
        assert_eq!(session.user_id, user.id);

        let (again, _) = provider
            .sign_in("a@example.com", "hunter22")
            .await
            .expect("sign_in failed");
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn sign_in_wrong_password_is_unauthorized() {
        let provider = setup_provider().await;
        provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect("sign_up failed");

        let err = provider
            .sign_in("a@example.com", "not-the-password")
            .await
            .expect_err("expected failure");
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let provider = setup_provider().await;
        provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect("sign_up failed");

        let err = provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect_err("expected conflict");
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn sign_up_rejects_bad_input() {
        let provider = setup_provider().await;

        let mut req = register_req("not-an-email");
        assert!(matches!(
            provider.sign_up(req).await,
            Err(AppError::Validation(_))
        ));

        req = register_req("a@example.com");
        req.password = "short".to_string();
        assert!(matches!(
            provider.sign_up(req).await,
            Err(AppError::Validation(_))
        ));

        req = register_req("a@example.com");
        req.username = "   ".to_string();
        assert!(matches!(
            provider.sign_up(req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sign_out_invalidates_session() {
        let provider = setup_provider().await;
        let (_, session) = provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect("sign_up failed");

        assert!(
            provider
                .current_session(&session.token)
                .await
                .expect("lookup failed")
                .is_some()
        );

        provider.sign_out(&session.token).await.expect("sign_out failed");
        assert!(
            provider
                .current_session(&session.token)
                .await
                .expect("lookup failed")
                .is_none()
        );

        // Signing out twice stays Ok.
        provider.sign_out(&session.token).await.expect("sign_out failed");
    }

    #[tokio::test]
    async fn expired_session_is_treated_as_absent() {
        let provider = setup_provider().await;
        let (user, _) = provider
            .sign_up(register_req("a@example.com"))
            .await
            .expect("sign_up failed");

        // TTL of -1 days puts expires_at in the past.
        let expired = repository::insert_session(&provider.db, &user.id, -1)
            .await
            .expect("insert failed");

        assert!(
            provider
                .current_session(&expired.token)
                .await
                .expect("lookup failed")
                .is_none()
        );
        // Lazily reaped on lookup.
        assert!(
            repository::find_session(&provider.db, &expired.token)
                .await
                .expect("find failed")
                .is_none()
        );
    }
}
