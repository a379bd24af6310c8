use std::sync::Arc;

use tracing::{instrument, warn};

use super::repo::AuthRepository;
use super::repo_types::{LoginResult, NewAccount};
use crate::error::AuthError;
use crate::users::repo_types::User;

/// Auth operations. Any repository failure is logged and replaced by an
/// operation-specific [`AuthError`]; the original detail is not surfaced.
pub struct AuthUseCase {
    repo: Arc<dyn AuthRepository>,
}

fn normalized<T>(
    result: Result<T, AuthError>,
    op: &'static str,
    message: &'static str,
) -> Result<T, AuthError> {
    result.map_err(|e| {
        warn!(error = %e, op, "auth use case failed");
        AuthError::new(message)
    })
}

impl AuthUseCase {
    pub fn new(repo: Arc<dyn AuthRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        normalized(self.repo.login(email, password).await, "login", "Login failed")
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: NewAccount) -> Result<User, AuthError> {
        normalized(
            self.repo.register(account).await,
            "register",
            "Registration failed",
        )
    }

    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        normalized(self.repo.logout().await, "logout", "Logout failed")
    }

    #[instrument(skip_all)]
    pub async fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        normalized(
            self.repo.verify_token(token).await,
            "verify_token",
            "Token verification failed",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every call with a detailed error and counts how often it was asked.
    #[derive(Default)]
    struct FailingRepo {
        calls: AtomicUsize,
    }

    impl FailingRepo {
        fn fail<T>(&self) -> Result<T, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::new("Invalid credentials"))
        }
    }

    #[async_trait]
    impl AuthRepository for FailingRepo {
        async fn login(&self, _: &str, _: &str) -> Result<LoginResult, AuthError> {
            self.fail()
        }
        async fn register(&self, _: NewAccount) -> Result<User, AuthError> {
            self.fail()
        }
        async fn logout(&self) -> Result<(), AuthError> {
            self.fail()
        }
        async fn verify_token(&self, _: &str) -> Result<User, AuthError> {
            self.fail()
        }
    }

    #[tokio::test]
    async fn failures_are_normalized_per_operation() {
        let repo = Arc::new(FailingRepo::default());
        let usecase = AuthUseCase::new(repo.clone());

        let err = usecase.login("a@b.co", "x").await.unwrap_err();
        assert_eq!(err.message(), "Login failed");

        let account = NewAccount {
            email: "a@b.co".into(),
            password: "password123".into(),
            username: "a".into(),
        };
        let err = usecase.register(account).await.unwrap_err();
        assert_eq!(err.message(), "Registration failed");

        let err = usecase.logout().await.unwrap_err();
        assert_eq!(err.message(), "Logout failed");

        let err = usecase.verify_token("t").await.unwrap_err();
        assert_eq!(err.message(), "Token verification failed");

        assert_eq!(repo.calls.load(Ordering::SeqCst), 4);
    }
}
