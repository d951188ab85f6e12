use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use super::dto::{AuthResponse, LoginRequest, RegisterRequest};
use super::extractors::AuthUser;
use super::services::AuthPayload;
use crate::error::AppResult;
use crate::state::AppState;
use crate::users::dto::MessageResponse;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

impl From<AuthPayload> for AuthResponse {
    fn from(payload: AuthPayload) -> Self {
        Self {
            user: payload.user.into(),
            token: payload.token,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let input = payload.validate()?;
    let registered = state.auth.register(input).await?;
    Ok((StatusCode::CREATED, Json(registered.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let creds = payload.validate()?;
    let logged_in = state.auth.login(creds).await?;
    Ok(Json(logged_in.into()))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(&caller).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}
