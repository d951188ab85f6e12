use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::query::{TrashScope, UserQuery};
use super::repo_types::{NewUser, User, UserChanges};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};

/// Store access for users. Multi-step writes run in a single transaction.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Count and fetch one page of rows matching `query`.
    async fn paginate(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>>;

    async fn find(&self, id: i64, scope: TrashScope) -> AppResult<Option<User>>;

    /// Active user with exactly this (normalized) email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` on a duplicate email.
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Applies `changes` to an active user and returns the re-read row.
    /// `None` when no active user has this id.
    async fn update(&self, id: i64, changes: UserChanges) -> AppResult<Option<User>>;

    /// `false` when no active user has this id.
    async fn soft_delete(&self, id: i64) -> AppResult<bool>;

    /// Clears the deletion marker of a user in any scope. An active user is
    /// returned untouched; `None` when no row has this id.
    async fn restore(&self, id: i64) -> AppResult<Option<User>>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, remember_token, \
                            email_verified_at, created_at, updated_at, deleted_at";

fn map_write_err(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict {
            field: "email",
            message: "The email has already been taken.".into(),
        },
        _ => AppError::Internal(anyhow::Error::new(e).context("write users")),
    }
}

/// Row lock within the caller's transaction, limited to `scope`.
async fn lock_user(
    conn: &mut PgConnection,
    id: i64,
    scope: TrashScope,
) -> Result<Option<User>, sqlx::Error> {
    let mut qb =
        QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id = "));
    qb.push_bind(id);
    if let Some(clause) = scope.clause() {
        qb.push(" AND ").push(clause);
    }
    qb.push(" FOR UPDATE");
    qb.build_query_as::<User>().fetch_optional(conn).await
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn paginate(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        query.push_where(&mut count);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        query.push_where(&mut select);
        query.push_order_by(&mut select);
        select
            .push(" LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select
            .build_query_as::<User>()
            .fetch_all(&self.db)
            .await
            .context("list users")?;

        debug!(total, returned = items.len(), "users page fetched");
        Ok(Page::new(items, page, total))
    }

    async fn find(&self, id: i64, scope: TrashScope) -> AppResult<Option<User>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id = "));
        qb.push_bind(id);
        if let Some(clause) = scope.clause() {
            qb.push(" AND ").push(clause);
        }

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .context("find user")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, remember_token,
                   email_verified_at, created_at, updated_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, remember_token,
                      email_verified_at, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await.context("commit tx")?;
        Ok(created)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> AppResult<Option<User>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let Some(locked) = lock_user(&mut tx, id, TrashScope::Active)
            .await
            .context("lock user")?
        else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(locked));
        }

        sqlx::query(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash),
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;

        // Re-read so store-computed columns are reflected.
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, remember_token,
                   email_verified_at, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("reload user")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }

    async fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let affected = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("soft delete user")?
        .rows_affected();

        tx.commit().await.context("commit tx")?;
        Ok(affected > 0)
    }

    async fn restore(&self, id: i64) -> AppResult<Option<User>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let Some(locked) = lock_user(&mut tx, id, TrashScope::WithTrashed)
            .await
            .context("lock user")?
        else {
            return Ok(None);
        };
        if !locked.is_trashed() {
            tx.commit().await.context("commit tx")?;
            return Ok(Some(locked));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET deleted_at = NULL, updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, remember_token,
                      email_verified_at, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("restore user")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }
}
