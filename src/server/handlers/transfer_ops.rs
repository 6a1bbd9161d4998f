// src/server/handlers/transfer_ops.rs

//! POST /transfer-ops/{id}/execute, POST /transfer-ops/{id}/complete
//! (spec §4.7, §6). `execute` moves `ready_for_transfer -> transferring`
//! and enqueues the copy worker; `complete` is the copy-verification
//! callback, driving the verify worker directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::domain::{Role, Transfer};
use crate::error::Error;
use crate::server::auth_middleware::AuthUser;
use crate::server::AppState;
use crate::state_machine::Actor;

use super::ApiResult;

fn require_it_team(role: Role) -> ApiResult<()> {
    if matches!(role, Role::ItTeam | Role::Admin) {
        Ok(())
    } else {
        Err(Error::authz("only it_team or admin may operate transfers").into())
    }
}

pub async fn execute(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    require_it_team(user.role)?;
    let actor = Actor::User { id: user.id, role: user.role };
    let transfer = state.copy_worker.execute(id, actor)?;
    Ok(Json(transfer))
}

pub async fn complete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    require_it_team(user.role)?;
    state.verify_worker.run(id).await?;
    let conn = state.store.connection()?;
    let transfer = crate::catalog::transfers::find_by_id(&conn, id)?
        .ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    Ok(Json(transfer))
}
