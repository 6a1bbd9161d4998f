// src/server/handlers/transfers.rs

//! Transfer CRUD: create, list, detail, submit, cancel. Visibility is
//! always checked through `policy::can_view`/`visible_statuses` so the
//! list and detail endpoints can never disagree (spec §8).

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::catalog::transfers;
use crate::domain::{NewTransfer, Transfer, TransferFile};
use crate::error::Error;
use crate::policy::{self, Visibility};
use crate::server::auth_middleware::AuthUser;
use crate::server::AppState;
use crate::state_machine::{self, Actor, Intent};

use super::ApiResult;

#[derive(Deserialize)]
pub struct CreateTransferRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub shotgrid_project_id: Option<String>,
    pub shotgrid_entity_id: Option<String>,
    pub shotgrid_entity_type: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateTransferRequest>,
) -> ApiResult<Json<Transfer>> {
    if !matches!(user.role, crate::domain::Role::Artist | crate::domain::Role::Admin) {
        return Err(Error::authz("only an artist or admin may create a transfer").into());
    }

    let store = state.store.clone();
    let staging_root = state.config.staging_root.clone();
    let new = NewTransfer {
        name: body.name,
        category: body.category,
        priority: body.priority,
        artist_id: user.id,
        tags: body.tags,
        shotgrid_project_id: body.shotgrid_project_id,
        shotgrid_entity_id: body.shotgrid_entity_id,
        shotgrid_entity_type: body.shotgrid_entity_type,
    };

    let transfer_id = store.with_txn(|txn| {
        let reference = transfers::next_reference(txn)?;
        let staging_path = staging_root.join(&reference);
        let id = transfers::insert(txn, &reference, staging_path.to_string_lossy().as_ref(), &new)?;
        crate::catalog::approvals::seed_chain(txn, id)?;
        Ok(id)
    })?;

    let conn = store.connection()?;
    let transfer = transfers::find_by_id(&conn, transfer_id)?
        .ok_or_else(|| Error::storage("transfer vanished immediately after insert"))?;
    Ok(Json(transfer))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Transfer>>> {
    let conn = state.store.connection()?;
    let transfers = match policy::visible_statuses(user.role) {
        Visibility::All => transfers::list_all(&conn)?,
        Visibility::OwnedOnly => transfers::list_by_artist(&conn, user.id)?,
        Visibility::Statuses(statuses) => transfers::list_for_statuses(&conn, &statuses)?,
        Visibility::StatusesOrOwned(statuses) => {
            let mut seen = HashSet::new();
            let mut merged = Vec::new();
            for t in transfers::list_for_statuses(&conn, &statuses)? {
                if seen.insert(t.id) {
                    merged.push(t);
                }
            }
            for t in transfers::list_by_artist(&conn, user.id)? {
                if seen.insert(t.id) {
                    merged.push(t);
                }
            }
            merged.sort_by_key(|t| t.id);
            merged
        }
    };
    Ok(Json(transfers))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    let conn = state.store.connection()?;
    let transfer = transfers::find_by_id(&conn, id)?.ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    if !policy::can_view(user.role, user.id, &transfer) {
        return Err(Error::authz("not authorized to view this transfer").into());
    }
    Ok(Json(transfer))
}

pub async fn files(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<TransferFile>>> {
    let conn = state.store.connection()?;
    let transfer = transfers::find_by_id(&conn, id)?.ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    if !policy::can_view(user.role, user.id, &transfer) {
        return Err(Error::authz("not authorized to view this transfer").into());
    }
    Ok(Json(crate::catalog::files::list_for_transfer(&conn, id)?))
}

/// POST /transfers/{id}/submit — the `uploaded -> pending_team_lead`
/// step spec.md §6 describes as "implicit via upload completion": the
/// artist calls this once every file for the batch has been uploaded.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    let actor = Actor::User { id: user.id, role: user.role };
    let outcome = state
        .store
        .with_txn(|txn| state_machine::apply(txn, id, Intent::Submit, actor))?;
    state.queue.enqueue_all(&outcome.queue_messages)?;
    Ok(Json(outcome.transfer))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transfer>> {
    let actor = Actor::User { id: user.id, role: user.role };
    let outcome = state
        .store
        .with_txn(|txn| state_machine::apply(txn, id, Intent::Cancel, actor))?;
    state.queue.enqueue_all(&outcome.queue_messages)?;
    Ok(Json(outcome.transfer))
}

pub async fn approval_chain(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<crate::domain::Approval>>> {
    let conn = state.store.connection()?;
    let transfer = transfers::find_by_id(&conn, id)?.ok_or_else(|| Error::not_found(format!("transfer {id}")))?;
    if !policy::can_view(user.role, user.id, &transfer) {
        return Err(Error::authz("not authorized to view this transfer").into());
    }
    drop(conn);
    Ok(Json(state.approvals.approval_chain(id)?))
}
