use std::sync::Arc;

use tracing::{error, instrument};

use super::repo::UserRepository;
use super::repo_types::{InsertUser, UpdateUser, User};
use crate::error::{AppError, Result};
use crate::validators::is_valid_email;

/// User operations: email validation in front of the repository. Errors are
/// logged and passed through as-is.
pub struct UserUseCase {
    repo: Arc<dyn UserRepository>,
}

fn ensure_email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::invalid_email().into())
    }
}

fn logged<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!(error = %e, op, "user use case failed");
    }
    result
}

impl UserUseCase {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        logged("get_user", self.repo.find_by_id(id).await)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let result = match ensure_email(email) {
            Ok(()) => self.repo.find_by_email(email).await,
            Err(e) => Err(e),
        };
        logged("get_user_by_email", result)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create_user(&self, user: InsertUser) -> Result<User> {
        let result = match ensure_email(&user.email) {
            Ok(()) => self.repo.create(user).await,
            Err(e) => Err(e),
        };
        logged("create_user", result)
    }

    #[instrument(skip(self, user))]
    pub async fn update_user(&self, id: &str, user: UpdateUser) -> Result<User> {
        let checked = match user.email.as_deref() {
            Some(email) => ensure_email(email),
            None => Ok(()),
        };
        let result = match checked {
            Ok(()) => self.repo.update(id, user).await,
            Err(e) => Err(e),
        };
        logged("update_user", result)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> Result<()> {
        logged("delete_user", self.repo.delete(id).await)
    }

    #[instrument(skip(self))]
    pub async fn get_all_users(&self) -> Result<Vec<User>> {
        logged("get_all_users", self.repo.find_all().await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Repository double that records every call and answers from a fixed user.
    #[derive(Default)]
    pub(crate) struct CountingRepo {
        pub calls: AtomicUsize,
        pub user: Mutex<Option<User>>,
        pub fail_with: Mutex<Option<AppError>>,
    }

    impl CountingRepo {
        pub fn with_user(user: User) -> Self {
            let repo = Self::default();
            *repo.user.lock().unwrap() = Some(user);
            repo
        }

        fn hit(&self) -> Result<Option<User>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.fail_with.lock().unwrap().clone() {
                return Err(e.into());
            }
            Ok(self.user.lock().unwrap().clone())
        }

        fn hit_some(&self) -> Result<User> {
            self.hit()?
                .ok_or_else(|| AppError::new(StatusCode::NOT_ACCEPTABLE, "no rows").into())
        }
    }

    #[async_trait]
    impl UserRepository for CountingRepo {
        async fn find_by_id(&self, _id: &str) -> Result<Option<User>> {
            self.hit()
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>> {
            self.hit()
        }
        async fn create(&self, _user: InsertUser) -> Result<User> {
            self.hit_some()
        }
        async fn update(&self, _id: &str, _user: UpdateUser) -> Result<User> {
            self.hit_some()
        }
        async fn delete(&self, _id: &str) -> Result<()> {
            self.hit().map(|_| ())
        }
        async fn find_all(&self) -> Result<Vec<User>> {
            self.hit().map(|u| u.into_iter().collect())
        }
    }

    pub(crate) fn sample_user() -> User {
        User {
            id: "1".into(),
            username: "testuser".into(),
            email: "test@example.com".into(),
            password: "hashedpassword".into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn update_with_bad_email_never_reaches_repository() {
        let repo = Arc::new(CountingRepo::with_user(sample_user()));
        let usecase = UserUseCase::new(repo.clone());

        let err = usecase
            .update_user(
                "1",
                UpdateUser {
                    email: Some("bad".into()),
                    username: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Invalid email format");
        assert!(matches!(err, Error::App(_)));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_without_email_skips_validation() {
        let repo = Arc::new(CountingRepo::with_user(sample_user()));
        let usecase = UserUseCase::new(repo.clone());

        usecase
            .update_user(
                "1",
                UpdateUser {
                    email: None,
                    username: Some("renamed".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn email_lookup_and_create_validate_first() {
        let repo = Arc::new(CountingRepo::with_user(sample_user()));
        let usecase = UserUseCase::new(repo.clone());

        assert!(usecase.get_user_by_email("invalid-email").await.is_err());
        let bad = InsertUser {
            email: "test@".into(),
            username: "testuser".into(),
            password: "password123".into(),
        };
        assert!(usecase.create_user(bad).await.is_err());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);

        let found = usecase.get_user_by_email("test@example.com").await.unwrap();
        assert_eq!(found.unwrap().id, "1");
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repository_errors_pass_through() {
        let repo = Arc::new(CountingRepo::default());
        *repo.fail_with.lock().unwrap() = Some(AppError::new(
            StatusCode::CONFLICT,
            "duplicate key value violates unique constraint",
        ));
        let usecase = UserUseCase::new(repo);

        let err = usecase.get_all_users().await.unwrap_err();
        assert_eq!(err.message(), "duplicate key value violates unique constraint");
        let err = usecase.delete_user("1").await.unwrap_err();
        assert!(matches!(err, Error::App(e) if e.status == StatusCode::CONFLICT));
    }
}
