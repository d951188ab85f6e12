use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::query::{TrashScope, UserQuery};
use super::repo::UserRepository;
use super::repo_types::{NewUser, User, UserChanges};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};

#[derive(Debug, Default)]
struct Rows {
    users: Vec<User>,
    last_id: i64,
}

impl Rows {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

fn duplicate_email() -> AppError {
    AppError::Conflict {
        field: "email",
        message: "The email has already been taken.".into(),
    }
}

/// Backs the service and router tests; honors the same scoping, ordering
/// and uniqueness rules as the Postgres repository.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    rows: Arc<RwLock<Rows>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn paginate(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<User> = rows
            .users
            .iter()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn find(&self, id: i64, scope: TrashScope) -> AppResult<Option<User>> {
        let rows = self.rows.read().await;
        Ok(rows
            .users
            .iter()
            .find(|u| u.id == id && scope.admits(u))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let rows = self.rows.read().await;
        Ok(rows
            .users
            .iter()
            .find(|u| u.email == email && !u.is_trashed())
            .cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut rows = self.rows.write().await;
        if rows.email_taken(&user.email, None) {
            return Err(duplicate_email());
        }

        rows.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: rows.last_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            remember_token: None,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.users.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> AppResult<Option<User>> {
        let mut rows = self.rows.write().await;
        let Some(idx) = rows
            .users
            .iter()
            .position(|u| u.id == id && !u.is_trashed())
        else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            if rows.email_taken(email, Some(id)) {
                return Err(duplicate_email());
            }
        }

        let user = &mut rows.users[idx];

        if !changes.is_empty() {
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(email) = changes.email {
                user.email = email;
            }
            if let Some(hash) = changes.password_hash {
                user.password_hash = hash;
            }
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(Some(user.clone()))
    }

    async fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        match rows
            .users
            .iter_mut()
            .find(|u| u.id == id && !u.is_trashed())
        {
            Some(user) => {
                let now = OffsetDateTime::now_utc();
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore(&self, id: i64) -> AppResult<Option<User>> {
        let mut rows = self.rows.write().await;
        let Some(user) = rows.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if user.deleted_at.take().is_some() {
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_emails_unique() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create(new_user("A", "a@example.com")).await.unwrap();
        let b = repo.create(new_user("B", "b@example.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let dup = repo.create(new_user("C", "A@example.com")).await;
        assert!(matches!(dup, Err(AppError::Conflict { field: "email", .. })));
    }

    #[tokio::test]
    async fn trashed_rows_keep_their_email_reserved() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create(new_user("A", "a@example.com")).await.unwrap();
        assert!(repo.soft_delete(a.id).await.unwrap());

        let dup = repo.create(new_user("A2", "a@example.com")).await;
        assert!(matches!(dup, Err(AppError::Conflict { .. })));
        assert!(repo.find_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_to_own_email_is_not_a_conflict() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create(new_user("A", "a@example.com")).await.unwrap();
        let changes = UserChanges {
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        assert!(repo.update(a.id, changes).await.unwrap().is_some());
    }
}
