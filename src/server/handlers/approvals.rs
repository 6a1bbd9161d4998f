// src/server/handlers/approvals.rs

//! POST /approvals/{id}/{approve,reject,override}, GET /approvals/pending
//! (spec §4.5, §6). `id` here is a transfer id, matching the path table
//! in spec.md §6 even though each decision lands against that transfer's
//! approval row for the actor's own stage.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::catalog::transfers;
use crate::domain::{RequiredRole, Status, Transfer};
use crate::error::Error;
use crate::server::auth_middleware::AuthUser;
use crate::server::AppState;
use crate::state_machine::Actor;

use super::{required_role_for, ApiResult};

/// Which stage `user` is deciding on `transfer`. A stage-owning role
/// always decides its own stage; an admin decides whichever human
/// stage the transfer currently sits at, so it only needs
/// `admin_override` for a transition that isn't a human stage at all.
fn stage_for(user: &crate::domain::User, transfer: &Transfer) -> ApiResult<RequiredRole> {
    if user.role.is_admin() {
        return match transfer.status {
            Status::PendingTeamLead => Ok(RequiredRole::TeamLead),
            Status::PendingSupervisor => Ok(RequiredRole::Supervisor),
            Status::PendingLineProducer => Ok(RequiredRole::LineProducer),
            other => Err(Error::precondition(format!("transfer is not awaiting a human approval stage (status: {other})")).into()),
        };
    }
    required_role_for(user.role).ok_or_else(|| Error::authz("this role does not own an approval stage").into())
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub target: Status,
    pub reason: String,
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<ApproveRequest>,
) -> ApiResult<Json<Transfer>> {
    let conn = state.store.connection()?;
    let current = transfers::find_by_id(&conn, id)?.ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    drop(conn);
    let required_role = stage_for(&user, &current)?;
    let actor = Actor::User { id: user.id, role: user.role };
    let transfer = state.approvals.approve(id, required_role, actor, body.comment)?;
    Ok(Json(transfer))
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Json<Transfer>> {
    let conn = state.store.connection()?;
    let current = transfers::find_by_id(&conn, id)?.ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    drop(conn);
    let required_role = stage_for(&user, &current)?;
    let actor = Actor::User { id: user.id, role: user.role };
    let transfer = state.approvals.reject(id, required_role, actor, body.reason)?;
    Ok(Json(transfer))
}

pub async fn admin_override(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<OverrideRequest>,
) -> ApiResult<Json<Transfer>> {
    let actor = Actor::User { id: user.id, role: user.role };
    let transfer = state.approvals.admin_override(id, body.target, actor, body.reason)?;
    Ok(Json(transfer))
}

pub async fn pending(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Transfer>>> {
    let actor = Actor::User { id: user.id, role: user.role };
    Ok(Json(state.approvals.pending_for(actor)?))
}
