use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::FromRef;
use sqlx::PgPool;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::extractors::AuthUser;
use super::jwt::JwtKeys;
use crate::error::AppResult;
use crate::state::AppState;
use crate::users::query::TrashScope;
use crate::users::repo::UserRepository;

pub const TOKEN_NAME: &str = "auth_token";

/// Row backing one issued bearer token.
#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub expires_at: OffsetDateTime,
}

/// Persistence of issued tokens; a token is live only while its row is.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: NewAccessToken) -> anyhow::Result<()>;

    /// Owner of a live, unexpired token; marks it as used.
    async fn find_active(&self, token_id: Uuid) -> anyhow::Result<Option<i64>>;

    /// `false` when the token was already gone.
    async fn delete(&self, token_id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: NewAccessToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO personal_access_tokens (id, user_id, name, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.name)
        .bind(token.expires_at)
        .execute(&self.db)
        .await
        .context("insert access token")?;
        Ok(())
    }

    async fn find_active(&self, token_id: Uuid) -> anyhow::Result<Option<i64>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE personal_access_tokens
               SET last_used_at = now()
             WHERE id = $1 AND (expires_at IS NULL OR expires_at > now())
            RETURNING user_id
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.db)
        .await
        .context("find access token")?;
        Ok(user_id)
    }

    async fn delete(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM personal_access_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.db)
            .await
            .context("delete access token")?
            .rows_affected();
        Ok(affected > 0)
    }
}

/// Issues, resolves and revokes bearer tokens. A token only authenticates
/// while its owner is an active user.
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserRepository>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl TokenService {
    pub fn new(
        keys: JwtKeys,
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { keys, store, users }
    }

    pub async fn issue(&self, user_id: i64) -> AppResult<String> {
        let now = OffsetDateTime::now_utc();
        let token_id = Uuid::new_v4();
        self.store
            .insert(NewAccessToken {
                id: token_id,
                user_id,
                name: TOKEN_NAME.to_string(),
                expires_at: now + TimeDuration::seconds(self.keys.ttl().as_secs() as i64),
            })
            .await?;
        let token = self.keys.sign(user_id, token_id, now)?;
        Ok(token)
    }

    /// `None` for anything that is not a live token of its claimed owner.
    pub async fn authenticate(&self, bearer: &str) -> AppResult<Option<AuthUser>> {
        let claims = match self.keys.verify(bearer) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "bearer token rejected");
                return Ok(None);
            }
        };
        let Some(user_id) = claims.user_id() else {
            return Ok(None);
        };

        match self.store.find_active(claims.jti).await? {
            Some(owner) if owner == user_id => {}
            Some(owner) => {
                warn!(owner, claimed = user_id, jti = %claims.jti, "token owner mismatch");
                return Ok(None);
            }
            None => return Ok(None),
        }

        if self.users.find(user_id, TrashScope::Active).await?.is_none() {
            debug!(user_id, jti = %claims.jti, "token owner is trashed or gone");
            return Ok(None);
        }

        Ok(Some(AuthUser {
            user_id,
            token_id: claims.jti,
        }))
    }

    pub async fn revoke(&self, token_id: Uuid) -> AppResult<bool> {
        Ok(self.store.delete(token_id).await?)
    }
}

#[cfg(test)]
pub use memory::InMemoryTokenStore;
