// src/server/auth_middleware.rs

//! Bearer token resolution (SPEC_FULL §4.11, §4.10). Every route but
//! `/health` and `/auth/login` requires `Authorization: Bearer <token>`;
//! this layer resolves it to a `User` and inserts it as a request
//! extension, the way the teacher threads request-scoped state through
//! `axum::extract::Extension`.

use std::sync::Arc;

use axum::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::User;

use super::AppState;

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let user = state
        .authenticator
        .resolve_token(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

/// Extension wrapper so `Extension<AuthUser>` can't be confused with a
/// bare `Extension<User>` some other layer happens to insert.
#[derive(Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or(StatusCode::UNAUTHORIZED)
    }
}
