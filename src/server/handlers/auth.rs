// src/server/handlers/auth.rs

//! POST /auth/login: the only unauthenticated mutating endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Authenticator;
use crate::domain::User;
use crate::server::AppState;

use super::ApiResult;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    /// The session's single bearer token, returned under both names:
    /// `LocalAuthenticator` does not distinguish access from refresh
    /// tokens (SPEC_FULL §4.11 names only one opaque session token),
    /// so there is nothing to refresh against — a client refreshes by
    /// logging in again once this expires.
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let authenticated = state.authenticator.authenticate(&body.username, &body.password).await?;
    Ok(Json(LoginResponse {
        access_token: authenticated.token.clone(),
        refresh_token: authenticated.token,
        user: authenticated.user,
    }))
}
