use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::dto::{CreateUser, UpdateUser};
use super::filters::{FilterParams, FilterPipeline};
use super::query::{TrashScope, UserQuery};
use super::repo::UserRepository;
use super::repo_types::{NewUser, User, UserChanges};
use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};

/// User management on top of a repository and the listing filters.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    filters: FilterPipeline,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, filters: FilterPipeline) -> Self {
        Self { repo, filters }
    }

    /// One page of users, oldest first. Active users unless the filters
    /// select the trashed ones.
    #[instrument(skip(self))]
    pub async fn get_all_users(&self, params: &FilterParams) -> AppResult<Page<User>> {
        let page = PageRequest::parse(params.get("page"), params.get("per_page"))
            .map_err(AppError::Validation)?;
        let query = self
            .filters
            .apply_filters(UserQuery::new(), params)
            .oldest_first();
        debug!(?query, ?page, "listing users");
        self.repo.paginate(&query, page).await
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        self.repo
            .find(id, TrashScope::Active)
            .await?
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUser) -> AppResult<User> {
        let password_hash = hash_password(&input.password)?;
        let user = self
            .repo
            .create(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
            })
            .await?;
        info!(user_id = user.id, "user created");
        Ok(user)
    }

    /// Applies only the supplied fields; a new password is re-hashed.
    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: i64, input: UpdateUser) -> AppResult<User> {
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let changes = UserChanges {
            name: input.name,
            email: input.email,
            password_hash,
        };
        let user = self
            .repo
            .update(id, changes)
            .await?
            .ok_or(AppError::NotFound)?;
        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        if !self.repo.soft_delete(id).await? {
            return Err(AppError::NotFound);
        }
        info!(user_id = id, "user soft-deleted");
        Ok(())
    }

    /// Restoring an active user succeeds without changing it.
    #[instrument(skip(self))]
    pub async fn restore_user(&self, id: i64) -> AppResult<User> {
        let user = self.repo.restore(id).await?.ok_or(AppError::NotFound)?;
        info!(user_id = user.id, "user restored");
        Ok(user)
    }
}
