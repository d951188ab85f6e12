use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::dto::Credentials;
use super::extractors::AuthUser;
use super::password::{hash_password, verify_password};
use super::tokens::TokenService;
use crate::error::{AppError, AppResult};
use crate::users::dto::CreateUser;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, User};

/// A user together with a freshly issued bearer token.
#[derive(Debug)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: CreateUser) -> AppResult<AuthPayload> {
        let password_hash = hash_password(&input.password)?;
        let user = self
            .users
            .create(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
            })
            .await?;
        let token = self.tokens.issue(user.id).await?;

        info!(user_id = user.id, "user registered");
        Ok(AuthPayload { user, token })
    }

    #[instrument(skip(self, creds), fields(email = %creds.email))]
    pub async fn login(&self, creds: Credentials) -> AppResult<AuthPayload> {
        let Some(user) = self.users.find_by_email(&creds.email).await? else {
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&creds.password, &user.password_hash)? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id).await?;
        info!(user_id = user.id, "user logged in");
        Ok(AuthPayload { user, token })
    }

    /// Revokes only the token the caller authenticated with.
    #[instrument(skip(self))]
    pub async fn logout(&self, caller: &AuthUser) -> AppResult<()> {
        if !self.tokens.revoke(caller.token_id).await? {
            warn!(user_id = caller.user_id, "logout without a live token");
            return Err(AppError::Unauthenticated);
        }
        info!(user_id = caller.user_id, "user logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use crate::auth::tokens::InMemoryTokenStore;
    use crate::config::JwtConfig;
    use crate::users::memory::InMemoryUserRepository;

    fn service() -> (AuthService, TokenService, Arc<InMemoryTokenStore>) {
        let store = Arc::new(InMemoryTokenStore::new());
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
        });
        let users = Arc::new(InMemoryUserRepository::new());
        let tokens = TokenService::new(keys, store.clone(), users.clone());
        (AuthService::new(users, tokens.clone()), tokens, store)
    }

    fn john() -> CreateUser {
        CreateUser {
            name: "John Doe".into(),
            email: "john@example.com".into(),
            password: "password123".into(),
        }
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_stores_hash_and_issues_token() {
        let (auth, tokens, store) = service();
        let payload = auth.register(john()).await.unwrap();

        assert_ne!(payload.user.password_hash, "password123");
        assert!(payload.user.password_hash.starts_with("$argon2"));
        assert_eq!(store.count_for(payload.user.id).await, 1);

        let caller = tokens.authenticate(&payload.token).await.unwrap().unwrap();
        assert_eq!(caller.user_id, payload.user.id);
    }

    #[tokio::test]
    async fn register_duplicate_email_conflicts() {
        let (auth, _, _) = service();
        auth.register(john()).await.unwrap();
        let err = auth.register(john()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { field: "email", .. }));
    }

    #[tokio::test]
    async fn login_with_correct_password() {
        let (auth, _, store) = service();
        let registered = auth.register(john()).await.unwrap();

        let payload = auth
            .login(creds("john@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(payload.user.id, registered.user.id);
        assert_eq!(store.count_for(registered.user.id).await, 2);
    }

    #[tokio::test]
    async fn login_failures_issue_no_token() {
        let (auth, _, store) = service();
        let registered = auth.register(john()).await.unwrap();

        let err = auth
            .login(creds("john@example.com", "wrongpassword"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let err = auth
            .login(creds("nobody@example.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        assert_eq!(store.count_for(registered.user.id).await, 1);
    }

    #[tokio::test]
    async fn logout_revokes_current_token_only() {
        let (auth, tokens, _) = service();
        let first = auth.register(john()).await.unwrap();
        let second = auth
            .login(creds("john@example.com", "password123"))
            .await
            .unwrap();

        let caller = tokens.authenticate(&first.token).await.unwrap().unwrap();
        auth.logout(&caller).await.unwrap();

        assert!(tokens.authenticate(&first.token).await.unwrap().is_none());
        assert!(tokens.authenticate(&second.token).await.unwrap().is_some());

        let err = auth.logout(&caller).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }
}
