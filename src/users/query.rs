//! Lazy description of a user lookup.
//!
//! A [`UserQuery`] is built up by filters and the service, then handed to a
//! repository which renders it into SQL ([`UserQuery::push_where`],
//! [`UserQuery::push_order_by`]). Tests evaluate the same query against rows
//! in memory (`matches`, `compare`); both renderings must agree.

#[cfg(test)]
use std::cmp::Ordering;

use sqlx::{Postgres, QueryBuilder};

#[cfg(test)]
use super::repo_types::User;

/// Which rows are visible with respect to the soft-delete marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashScope {
    #[default]
    Active,
    OnlyTrashed,
    WithTrashed,
}

impl TrashScope {
    pub fn clause(self) -> Option<&'static str> {
        match self {
            TrashScope::Active => Some("deleted_at IS NULL"),
            TrashScope::OnlyTrashed => Some("deleted_at IS NOT NULL"),
            TrashScope::WithTrashed => None,
        }
    }

    #[cfg(test)]
    pub fn admits(self, user: &User) -> bool {
        match self {
            TrashScope::Active => !user.is_trashed(),
            TrashScope::OnlyTrashed => user.is_trashed(),
            TrashScope::WithTrashed => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive substring match on name OR email.
    NameOrEmailContains(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Id,
    OldestFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    scope: TrashScope,
    conditions: Vec<Condition>,
    order: OrderBy,
}

impl UserQuery {
    /// Active rows, no conditions, ordered by id.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only_trashed(mut self) -> Self {
        self.scope = TrashScope::OnlyTrashed;
        self
    }

    pub fn name_or_email_contains(mut self, needle: &str) -> Self {
        self.conditions
            .push(Condition::NameOrEmailContains(needle.to_string()));
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.order = OrderBy::OldestFirst;
        self
    }

    #[cfg(test)]
    pub fn scope(&self) -> TrashScope {
        self.scope
    }

    #[cfg(test)]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[cfg(test)]
    pub fn order(&self) -> OrderBy {
        self.order
    }

    /// Appends ` WHERE ...` covering scope and conditions, if any apply.
    pub fn push_where<'a>(&self, qb: &mut QueryBuilder<'a, Postgres>) {
        let mut first = true;
        let mut next = |qb: &mut QueryBuilder<'a, Postgres>| {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(clause) = self.scope.clause() {
            next(qb);
            qb.push(clause);
        }

        for condition in &self.conditions {
            next(qb);
            match condition {
                Condition::NameOrEmailContains(needle) => {
                    let pattern = format!("%{}%", escape_like(needle));
                    qb.push("(name ILIKE ");
                    qb.push_bind(pattern.clone());
                    qb.push(" OR email ILIKE ");
                    qb.push_bind(pattern);
                    qb.push(")");
                }
            }
        }
    }

    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self.order {
            OrderBy::Id => qb.push(" ORDER BY id ASC"),
            OrderBy::OldestFirst => qb.push(" ORDER BY created_at ASC, id ASC"),
        };
    }

    #[cfg(test)]
    pub fn matches(&self, user: &User) -> bool {
        self.scope.admits(user)
            && self.conditions.iter().all(|condition| match condition {
                Condition::NameOrEmailContains(needle) => {
                    let needle = needle.to_lowercase();
                    user.name.to_lowercase().contains(&needle)
                        || user.email.to_lowercase().contains(&needle)
                }
            })
    }

    #[cfg(test)]
    pub fn compare(&self, a: &User, b: &User) -> Ordering {
        match self.order {
            OrderBy::Id => a.id.cmp(&b.id),
            OrderBy::OldestFirst => a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

/// Escapes LIKE metacharacters so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
