use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use super::repo_types::{LoginResult, NewAccount};
use crate::error::AuthError;
use crate::provider::{AuthProvider, ProviderUser};
use crate::users::repo_types::User;

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;
    async fn register(&self, account: NewAccount) -> Result<User, AuthError>;
    async fn logout(&self) -> Result<(), AuthError>;
    async fn verify_token(&self, token: &str) -> Result<User, AuthError>;
}

/// [`AuthRepository`] over an [`AuthProvider`].
pub struct ProviderAuthRepository {
    provider: Arc<dyn AuthProvider>,
}

impl ProviderAuthRepository {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

/// Domain view of a provider account. The password never leaves the provider.
fn to_user(user: ProviderUser) -> User {
    let username = user
        .user_metadata
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    User {
        id: user.id,
        email: user.email.unwrap_or_default(),
        username,
        password: String::new(),
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

#[async_trait]
impl AuthRepository for ProviderAuthRepository {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let payload = self
            .provider
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, details = ?e.details, "provider sign-in failed");
                AuthError::new("Invalid credentials")
            })?;
        match (payload.user, payload.session) {
            (Some(user), Some(session)) => Ok(LoginResult {
                user: to_user(user),
                token: session.access_token,
            }),
            _ => {
                warn!("sign-in succeeded without user or session");
                Err(AuthError::new("Login failed"))
            }
        }
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn register(&self, account: NewAccount) -> Result<User, AuthError> {
        let mut metadata = Map::new();
        metadata.insert("username".into(), Value::String(account.username));
        let payload = self
            .provider
            .sign_up(&account.email, &account.password, metadata)
            .await
            .map_err(|e| {
                warn!(error = %e, details = ?e.details, "provider sign-up failed");
                AuthError::new("Registration failed")
            })?;
        payload.user.map(to_user).ok_or_else(|| {
            warn!("sign-up succeeded without a user");
            AuthError::new("User creation failed")
        })
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await.map_err(|e| {
            warn!(error = %e, "provider sign-out failed");
            AuthError::new("Logout failed")
        })
    }

    #[instrument(skip_all)]
    async fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        match self.provider.get_user(token).await {
            Ok(Some(user)) => Ok(to_user(user)),
            Ok(None) => {
                warn!("token introspection returned no user");
                Err(AuthError::new("Invalid token"))
            }
            Err(e) => {
                warn!(error = %e, "token introspection failed");
                Err(AuthError::new("Invalid token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalAuthConfig;
    use crate::error::AppError;
    use crate::provider::memory::MemoryAuth;
    use crate::provider::AuthPayload;
    use axum::http::StatusCode;
    use serde_json::json;

    fn repo() -> ProviderAuthRepository {
        ProviderAuthRepository::new(Arc::new(MemoryAuth::new(&LocalAuthConfig::default())))
    }

    fn account() -> NewAccount {
        NewAccount {
            email: "testuser@example.com".into(),
            password: "password123".into(),
            username: "testuser".into(),
        }
    }

    /// Provider that answers sign-in / sign-up with a fixed payload.
    struct FixedProvider(AuthPayload);

    #[async_trait]
    impl AuthProvider for FixedProvider {
        async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<AuthPayload, AppError> {
            Ok(self.0.clone())
        }
        async fn sign_up(&self, _: &str, _: &str, _: Map<String, Value>) -> Result<AuthPayload, AppError> {
            Ok(self.0.clone())
        }
        async fn sign_out(&self) -> Result<(), AppError> {
            Err(AppError::new(StatusCode::BAD_GATEWAY, "connection reset"))
        }
        async fn get_user(&self, _: &str) -> Result<Option<ProviderUser>, AppError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn register_then_login_never_exposes_password() {
        let repo = repo();
        let user = repo.register(account()).await.unwrap();
        assert_eq!(user.username, "testuser");
        assert_eq!(user.password, "");

        let login = repo.login("testuser@example.com", "password123").await.unwrap();
        assert!(!login.token.is_empty());
        assert_eq!(login.user.id, user.id);
        assert_eq!(login.user.password, "");

        let verified = repo.verify_token(&login.token).await.unwrap();
        assert_eq!(verified.email, "testuser@example.com");
        assert_eq!(verified.password, "");
    }

    #[tokio::test]
    async fn provider_failures_map_to_fixed_messages() {
        let repo = repo();
        let err = repo.login("nobody@example.com", "password123").await.unwrap_err();
        assert_eq!(err.message(), "Invalid credentials");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        repo.register(account()).await.unwrap();
        let err = repo.register(account()).await.unwrap_err();
        assert_eq!(err.message(), "Registration failed");

        let err = repo.verify_token("invalid-token").await.unwrap_err();
        assert_eq!(err.message(), "Invalid token");
    }

    #[tokio::test]
    async fn incomplete_success_payloads_are_rejected() {
        let user: ProviderUser = serde_json::from_value(json!({ "id": "u-1" })).unwrap();
        let repo = ProviderAuthRepository::new(Arc::new(FixedProvider(AuthPayload {
            user: Some(user),
            session: None,
        })));
        let err = repo.login("a@b.co", "secret1").await.unwrap_err();
        assert_eq!(err.message(), "Login failed");

        let user = repo.register(account()).await.unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.username, "");

        let repo = ProviderAuthRepository::new(Arc::new(FixedProvider(AuthPayload::default())));
        let err = repo.register(account()).await.unwrap_err();
        assert_eq!(err.message(), "User creation failed");
        let err = repo.verify_token("whatever").await.unwrap_err();
        assert_eq!(err.message(), "Invalid token");
        let err = repo.logout().await.unwrap_err();
        assert_eq!(err.message(), "Logout failed");
    }

    #[tokio::test]
    async fn logout_revokes_current_session() {
        let repo = repo();
        repo.register(account()).await.unwrap();
        let login = repo.login("testuser@example.com", "password123").await.unwrap();
        repo.logout().await.unwrap();
        assert!(repo.verify_token(&login.token).await.is_err());
    }
}
