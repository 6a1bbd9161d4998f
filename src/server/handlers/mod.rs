// src/server/handlers/mod.rs

//! One handler module per resource family (SPEC_FULL §4.10), each a
//! thin translation from an HTTP request into an `ApprovalCoordinator`/
//! `StateMachine`/`Catalog` call and a typed JSON response.

pub mod approvals;
pub mod auth;
pub mod health;
pub mod scanning;
pub mod transfer_ops;
pub mod transfers;
pub mod upload;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{RequiredRole, Role};
use crate::error::Error;

/// Wraps `crate::Error` so the crate's core error type never has to
/// know about HTTP — the status-code mapping of spec §7 lives here,
/// at the one boundary that needs it.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Precondition(_) => StatusCode::BAD_REQUEST,
            Error::AuthZ(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) | Error::WorkerExternal(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, axum::Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The `RequiredRole` a given `Role` owns a decision for, or `None` if
/// the role never decides a human approval stage (artist, data_team,
/// it_team act through other endpoints; admin acts through override).
pub fn required_role_for(role: Role) -> Option<RequiredRole> {
    match role {
        Role::TeamLead => Some(RequiredRole::TeamLead),
        Role::Supervisor => Some(RequiredRole::Supervisor),
        Role::LineProducer => Some(RequiredRole::LineProducer),
        _ => None,
    }
}
