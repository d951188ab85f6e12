use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwt::JwtKeys;
use crate::auth::services::AuthService;
use crate::auth::tokens::{PgTokenStore, TokenService, TokenStore};
use crate::config::AppConfig;
use crate::users::filters::FilterPipeline;
use crate::users::repo::{PgUserRepository, UserRepository};
use crate::users::services::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub auth: AuthService,
    pub tokens: TokenService,
}

impl AppState {
    pub fn from_parts(
        config: &AppConfig,
        users: Arc<dyn UserRepository>,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        let tokens = TokenService::new(
            JwtKeys::from_config(&config.jwt),
            token_store,
            users.clone(),
        );
        Self {
            users: UserService::new(users.clone(), FilterPipeline::standard()),
            auth: AuthService::new(users, tokens.clone()),
            tokens,
        }
    }

    pub fn postgres(config: &AppConfig, db: PgPool) -> Self {
        Self::from_parts(
            config,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgTokenStore::new(db)),
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::auth::tokens::InMemoryTokenStore;
        use crate::users::memory::InMemoryUserRepository;

        Self::from_parts(
            &AppConfig::for_tests(),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryTokenStore::new()),
        )
    }
}
