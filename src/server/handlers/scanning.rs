// src/server/handlers/scanning.rs

//! POST /scanning/{id}/start, POST /scanning/{id}/complete (spec §4.6,
//! §6). `start` moves `approved -> scanning` and enqueues the scan
//! worker; `complete` is the worker callback, also exposed as an
//! operator-triggerable endpoint for resilience (re-running a scan that
//! never reported back).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::domain::{Role, Transfer};
use crate::error::Error;
use crate::server::auth_middleware::AuthUser;
use crate::server::AppState;
use crate::state_machine::{self, Actor, Intent};

use super::ApiResult;

fn require_data_team(role: Role) -> ApiResult<()> {
    if matches!(role, Role::DataTeam | Role::Admin) {
        Ok(())
    } else {
        Err(Error::authz("only data_team or admin may operate scanning").into())
    }
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    require_data_team(user.role)?;
    let actor = Actor::User { id: user.id, role: user.role };
    let outcome = state.store.with_txn(|txn| state_machine::apply(txn, id, Intent::StartScan, actor))?;
    state.queue.enqueue_all(&outcome.queue_messages)?;
    Ok(Json(outcome.transfer))
}

pub async fn complete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    require_data_team(user.role)?;
    state.scan_worker.run(id).await?;
    let conn = state.store.connection()?;
    let transfer = crate::catalog::transfers::find_by_id(&conn, id)?
        .ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    Ok(Json(transfer))
}
