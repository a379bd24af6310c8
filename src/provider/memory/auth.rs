use std::collections::{HashMap, HashSet};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use rand::rngs::OsRng;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::tokens::TokenKeys;
use crate::config::LocalAuthConfig;
use crate::error::AppError;
use crate::provider::{AuthPayload, AuthProvider, ProviderSession, ProviderUser};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: ProviderUser,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>, // key: email
    live_sessions: HashSet<String>,
    current_session: Option<String>,
}

/// In-process auth provider: Argon2 credentials, JWT access tokens and
/// server-side session revocation.
pub struct MemoryAuth {
    keys: TokenKeys,
    inner: RwLock<Inner>,
}

fn auth_error(status: StatusCode, code: &str, message: &str) -> AppError {
    AppError::new(status, message).with_details(json!({ "error_code": code, "msg": message }))
}

fn internal(e: anyhow::Error) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn credential_error(e: argon2::password_hash::Error) -> AppError {
    error!(error = %e, "argon2 failure");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("credential store: {}", e))
}

fn hash_credential(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(credential_error)
}

fn credential_matches(plain: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored).map_err(credential_error)?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl MemoryAuth {
    pub fn new(cfg: &LocalAuthConfig) -> Self {
        Self {
            keys: TokenKeys::new(cfg),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Opens a new session for `user` and makes it the current one.
    async fn open_session(&self, user: &ProviderUser) -> Result<ProviderSession, AppError> {
        let session_id = Uuid::new_v4().to_string();
        let email = user.email.as_deref().unwrap_or_default();
        let access_token = self
            .keys
            .sign(&user.id, &session_id, email)
            .map_err(internal)?;

        let mut inner = self.inner.write().await;
        inner.live_sessions.insert(session_id.clone());
        inner.current_session = Some(session_id);

        Ok(ProviderSession {
            access_token,
            token_type: Some("bearer".into()),
            expires_in: Some(self.keys.ttl().as_secs() as i64),
            refresh_token: None,
        })
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, AppError> {
        let found = {
            let inner = self.inner.read().await;
            inner
                .accounts
                .get(email)
                .map(|a| (a.user.clone(), a.password_hash.clone()))
        };
        let invalid = || {
            auth_error(
                StatusCode::BAD_REQUEST,
                "invalid_credentials",
                "Invalid login credentials",
            )
        };

        let Some((user, hash)) = found else {
            warn!("sign-in for unknown email");
            return Err(invalid());
        };
        if !credential_matches(password, &hash)? {
            warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(invalid());
        }

        let session = self.open_session(&user).await?;
        debug!(user_id = %user.id, "signed in");
        Ok(AuthPayload {
            user: Some(user),
            session: Some(session),
        })
    }

    #[instrument(skip(self, password, metadata))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthPayload, AppError> {
        if email.trim().is_empty() {
            return Err(auth_error(
                StatusCode::BAD_REQUEST,
                "validation_failed",
                "To signup, please provide your email",
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(auth_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "weak_password",
                "Password should be at least 6 characters.",
            ));
        }

        let password_hash = hash_credential(password)?;
        let now = OffsetDateTime::now_utc();
        let user = ProviderUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: metadata,
            created_at: Some(now),
            updated_at: Some(now),
        };

        {
            let mut inner = self.inner.write().await;
            if inner.accounts.contains_key(email) {
                warn!("sign-up for existing email");
                return Err(auth_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "user_already_exists",
                    "User already registered",
                ));
            }
            inner.accounts.insert(
                email.to_string(),
                Account {
                    user: user.clone(),
                    password_hash,
                },
            );
        }

        // accounts are auto-confirmed, so sign-up also signs in
        let session = self.open_session(&user).await?;
        debug!(user_id = %user.id, "signed up");
        Ok(AuthPayload {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(session_id) = inner.current_session.take() {
            inner.live_sessions.remove(&session_id);
            debug!(%session_id, "session revoked");
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, AppError> {
        let claims = self.keys.verify(access_token).map_err(|e| {
            auth_error(
                StatusCode::UNAUTHORIZED,
                "bad_jwt",
                &format!("invalid JWT: {}", e),
            )
        })?;

        let inner = self.inner.read().await;
        if !inner.live_sessions.contains(&claims.session_id) {
            return Err(auth_error(
                StatusCode::FORBIDDEN,
                "session_not_found",
                "Session from session_id claim in JWT does not exist",
            ));
        }
        Ok(inner
            .accounts
            .values()
            .find(|a| a.user.id == claims.sub)
            .map(|a| a.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MemoryAuth {
        MemoryAuth::new(&LocalAuthConfig {
            secret: "test-secret".into(),
            issuer: "userhub".into(),
            audience: "authenticated".into(),
            ttl_minutes: 5,
        })
    }

    fn meta(username: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("username".into(), json!(username));
        m
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_issues_verifiable_token() {
        let auth = provider();
        auth.sign_up("a@example.com", "password123", meta("alice"))
            .await
            .unwrap();

        let payload = auth
            .sign_in_with_password("a@example.com", "password123")
            .await
            .unwrap();
        let token = payload.session.unwrap().access_token;
        let user = auth.get_user(&token).await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.user_metadata["username"], "alice");
    }

    #[tokio::test]
    async fn duplicate_sign_up_and_bad_password_fail() {
        let auth = provider();
        auth.sign_up("a@example.com", "password123", meta("alice"))
            .await
            .unwrap();

        let dup = auth
            .sign_up("a@example.com", "password123", meta("alice"))
            .await
            .unwrap_err();
        assert_eq!(dup.message, "User already registered");

        let bad = auth
            .sign_in_with_password("a@example.com", "nope-nope")
            .await
            .unwrap_err();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sign_out_revokes_current_session_only() {
        let auth = provider();
        let first = auth
            .sign_up("a@example.com", "password123", meta("alice"))
            .await
            .unwrap()
            .session
            .unwrap()
            .access_token;
        let second = auth
            .sign_in_with_password("a@example.com", "password123")
            .await
            .unwrap()
            .session
            .unwrap()
            .access_token;

        auth.sign_out().await.unwrap();
        assert!(auth.get_user(&second).await.is_err());
        assert!(auth.get_user(&first).await.unwrap().is_some());
        // nothing current any more
        auth.sign_out().await.unwrap();
    }

    #[test]
    fn stored_credentials_are_argon2_hashes() {
        let hash = hash_credential("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(credential_matches("password123", &hash).unwrap());
        assert!(!credential_matches("password124", &hash).unwrap());

        let err = credential_matches("anything", "not-a-valid-hash").unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let err = provider().get_user("invalid-token").await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
