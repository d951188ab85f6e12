use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{
    validate_index_params, DataResponse, MessageResponse, StoreUserRequest, UpdateUserRequest,
    UserResource,
};
use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::pagination::PageResponse;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(index).post(store))
        .route("/users/:id", get(show).put(update).delete(destroy))
        .route("/users/:id/restore", post(restore))
}

#[instrument(skip(state, _auth))]
pub async fn index(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(raw): Query<HashMap<String, String>>,
) -> AppResult<Json<PageResponse<UserResource>>> {
    let params = validate_index_params(raw)?;
    let page = state.users.get_all_users(&params).await?;
    Ok(Json(page.map(UserResource::from).into()))
}

#[instrument(skip(state, _auth))]
pub async fn show(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DataResponse<UserResource>>> {
    let user = state.users.get_user(id).await?;
    Ok(Json(DataResponse { data: user.into() }))
}

#[instrument(skip(state, _auth, payload))]
pub async fn store(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(payload): Json<StoreUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResource>>)> {
    let input = payload.validate()?;
    let user = state.users.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: user.into() })))
}

#[instrument(skip(state, _auth, payload))]
pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResource>>> {
    let input = payload.validate()?;
    let user = state.users.update_user(id, input).await?;
    Ok(Json(DataResponse { data: user.into() }))
}

#[instrument(skip(state, _auth))]
pub async fn destroy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.users.delete_user(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}

#[instrument(skip(state, _auth))]
pub async fn restore(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DataResponse<UserResource>>> {
    let user = state.users.restore_user(id).await?;
    Ok(Json(DataResponse { data: user.into() }))
}
