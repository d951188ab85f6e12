use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod filters;
pub mod handlers;
pub mod query;
pub mod repo;
pub mod repo_types;
pub mod services;

#[cfg(test)]
pub mod memory;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
