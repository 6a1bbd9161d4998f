// src/state_machine/mod.rs

//! The transfer state machine (spec §4.1): `apply` is the sole mutator
//! of a Transfer's status. The transition table is an exhaustive
//! `match` over `(Status, Intent)`, guarded per-arm by the actor's role
//! — per the teacher's Design Notes instruction to model roles as a
//! closed sum type and dispatch on it with a `match`, never a `HashMap`
//! of tuples or a string comparison.

mod transition;

use chrono::Utc;
use rusqlite::Connection;
use serde_json::{Value as Json, json};

use crate::catalog::{approvals, history, transfers};
use crate::domain::{ApprovalStatus, RequiredRole, Role, Status, Transfer};
use crate::error::{Error, Result};
use crate::notifications::fanout::{self, TransitionEvent};
use crate::queue::QueueMessage;

pub use transition::transition;

/// Who is driving the transition. Worker-triggered intents (scan
/// completion, copy/verify outcomes, prepare) are not tied to a human
/// identity — they come from trusted internal callers, optionally
/// surfaced over HTTP by an operator-triggered resilience endpoint that
/// has already checked the caller's role before reaching here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User { id: i64, role: Role },
    Worker,
}

impl Actor {
    pub fn id(&self) -> Option<i64> {
        match self {
            Actor::User { id, .. } => Some(*id),
            Actor::Worker => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Actor::User { role, .. } => Some(*role),
            Actor::Worker => None,
        }
    }
}

/// Every way `apply` can be asked to move a Transfer forward. One
/// variant per edge label in spec §4.1's transition diagram.
#[derive(Debug, Clone)]
pub enum Intent {
    Submit,
    Approve { required_role: RequiredRole, comment: Option<String> },
    Reject { required_role: RequiredRole, reason: String },
    StartScan,
    CompleteScan { scan_result: Json, all_clean: bool },
    Prepare { production_path: String },
    Execute { transfer_method: String },
    CopyDone,
    CopyError { detail: String },
    VerifyOk,
    VerifyMismatch { mismatched_files: Vec<String> },
    Cancel,
    Override { target: Status, reason: String },
}

impl Intent {
    fn history_action(&self) -> &'static str {
        match self {
            Intent::Submit => "submitted",
            Intent::Approve { .. } => "approved",
            Intent::Reject { .. } => "rejected",
            Intent::StartScan => "scan_started",
            Intent::CompleteScan { all_clean: true, .. } => "scan_passed",
            Intent::CompleteScan { all_clean: false, .. } => "scan_failed",
            Intent::Prepare { .. } => "prepared",
            Intent::Execute { .. } => "transfer_started",
            Intent::CopyDone => "transfer_copied",
            Intent::CopyError { .. } => "transfer_error",
            Intent::VerifyOk => "transferred",
            Intent::VerifyMismatch { .. } => "verification_failed",
            Intent::Cancel => "cancelled",
            Intent::Override { .. } => "admin_override",
        }
    }
}

/// What a committed `apply` call produced: the transfer's new row and
/// the queue messages the caller must hand to `TaskQueue` once the
/// transaction guard has dropped (never before commit, per spec §4.1
/// step 8).
pub struct ApplyOutcome {
    pub transfer: Transfer,
    pub queue_messages: Vec<QueueMessage>,
}

/// The sole mutator of Transfer status. Must run inside a
/// `BEGIN IMMEDIATE` transaction opened by the caller (`Store::with_txn`)
/// so the load-check-write sequence is atomic against concurrent
/// `apply` calls on the same transfer.
pub fn apply(conn: &Connection, transfer_id: i64, intent: Intent, actor: Actor) -> Result<ApplyOutcome> {
    let transfer = transfers::find_for_update(conn, transfer_id)?
        .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;

    let next_status = transition(transfer.status, &intent, actor)
        .ok_or_else(|| Error::precondition(format!(
            "no transition from {} via {:?} for this actor", transfer.status, intent
        )))?;

    check_predicate(conn, &transfer, &intent, actor)?;

    apply_side_effects(conn, &transfer, &intent, next_status, actor)?;
    transfers::set_status(conn, transfer_id, next_status)?;

    let metadata = history_metadata(&transfer, next_status, &intent, actor);
    history::append(
        conn,
        transfer_id,
        actor.id(),
        intent.history_action(),
        &history_description(&intent, next_status),
        &metadata,
    )?;

    let updated = transfers::find_by_id(conn, transfer_id)?
        .ok_or_else(|| Error::storage("transfer vanished mid-transaction"))?;

    let event = TransitionEvent {
        transfer: updated.clone(),
        intent: &intent,
        actor,
    };
    fanout::fanout(conn, &event)?;

    let queue_messages = queue_messages_for(&updated, &intent);

    Ok(ApplyOutcome { transfer: updated, queue_messages })
}

/// Step 3: intent-specific preconditions beyond "is this edge legal".
fn check_predicate(conn: &Connection, transfer: &Transfer, intent: &Intent, actor: Actor) -> Result<()> {
    match intent {
        Intent::Submit => {
            if transfer.total_files < 1 {
                return Err(Error::precondition("cannot submit a transfer with zero files"));
            }
        }
        Intent::Approve { required_role, .. } => {
            let stage = approvals::find_stage(conn, transfer.id, *required_role)?
                .ok_or_else(|| Error::storage("missing approval stage row"))?;
            if !stage.is_pending() {
                return Err(Error::precondition(format!(
                    "{required_role} stage is already {}", stage.status
                )));
            }
        }
        Intent::Reject { required_role, reason } => {
            if reason.trim().len() < 10 {
                return Err(Error::precondition("rejection reason must be at least 10 characters"));
            }
            let stage = approvals::find_stage(conn, transfer.id, *required_role)?
                .ok_or_else(|| Error::storage("missing approval stage row"))?;
            if !stage.is_pending() {
                return Err(Error::precondition(format!(
                    "{required_role} stage is already {}", stage.status
                )));
            }
        }
        Intent::Cancel => {
            let is_owner = actor.id() == Some(transfer.artist_id);
            let is_admin = actor.role().map(|r| r.is_admin()).unwrap_or(false);
            if !is_owner && !is_admin {
                return Err(Error::authz("only the owning artist or an admin may cancel"));
            }
        }
        Intent::Override { reason, .. } if reason.trim().is_empty() => {
            return Err(Error::precondition("override requires a reason"));
        }
        _ => {}
    }
    Ok(())
}

fn apply_side_effects(
    conn: &Connection,
    transfer: &Transfer,
    intent: &Intent,
    next_status: Status,
    actor: Actor,
) -> Result<()> {
    let actor_id = actor.id();
    match intent {
        Intent::Approve { required_role, comment } => {
            approvals::decide(
                conn,
                transfer.id,
                *required_role,
                actor_id,
                ApprovalStatus::Approved,
                comment.as_deref(),
            )?;
        }
        Intent::Reject { required_role, reason } => {
            approvals::decide(conn, transfer.id, *required_role, actor_id, ApprovalStatus::Rejected, Some(reason))?;
            transfers::set_rejection_reason(conn, transfer.id, reason)?;
        }
        Intent::CompleteScan { scan_result, all_clean } => {
            transfers::set_scan_result(conn, transfer.id, scan_result, *all_clean)?;
            if *all_clean {
                // The data_team stage is flipped by scan completion, not a human decision.
                approvals::decide(conn, transfer.id, RequiredRole::DataTeam, None, ApprovalStatus::Approved, None)?;
            }
        }
        Intent::Prepare { production_path } => {
            transfers::set_production_path(conn, transfer.id, Some(production_path))?;
        }
        Intent::Execute { transfer_method } => {
            transfers::set_transfer_method(conn, transfer.id, transfer_method)?;
            transfers::set_transfer_started(conn, transfer.id)?;
        }
        Intent::VerifyOk => {
            transfers::set_transfer_completed(conn, transfer.id, true)?;
            // The it_team stage is flipped by verify completion, not a human decision.
            approvals::decide(conn, transfer.id, RequiredRole::ItTeam, None, ApprovalStatus::Approved, None)?;
        }
        Intent::VerifyMismatch { .. } => {
            transfers::set_transfer_completed(conn, transfer.id, false)?;
        }
        Intent::Override { reason, .. } => {
            for stage in approvals::list_for_transfer(conn, transfer.id)? {
                if stage.is_pending() {
                    approvals::decide(conn, transfer.id, stage.required_role, actor_id, ApprovalStatus::Skipped, Some(reason))?;
                }
            }
        }
        _ => {}
    }
    let _ = next_status;
    Ok(())
}

fn history_metadata(transfer: &Transfer, next_status: Status, intent: &Intent, actor: Actor) -> Json {
    let mut metadata = json!({
        "old_status": transfer.status.as_str(),
        "new_status": next_status.as_str(),
        "actor": actor.id(),
    });
    match intent {
        Intent::Reject { reason, .. } => metadata["reason"] = json!(reason),
        Intent::Approve { comment, .. } => metadata["comment"] = json!(comment),
        Intent::Override { reason, target } => {
            metadata["reason"] = json!(reason);
            metadata["target"] = json!(target.as_str());
        }
        Intent::VerifyMismatch { mismatched_files } => {
            metadata["mismatched_files"] = json!(mismatched_files.iter().take(5).collect::<Vec<_>>());
        }
        Intent::CopyError { detail } => metadata["detail"] = json!(detail),
        _ => {}
    }
    metadata
}

fn history_description(intent: &Intent, next_status: Status) -> String {
    format!("{} -> {}", intent.history_action(), next_status)
}

fn queue_messages_for(transfer: &Transfer, intent: &Intent) -> Vec<QueueMessage> {
    match intent {
        Intent::StartScan => vec![QueueMessage::ScanTransfer { transfer_id: transfer.id }],
        Intent::CompleteScan { all_clean: true, .. } => {
            vec![QueueMessage::PrepareTransfer { transfer_id: transfer.id }]
        }
        Intent::Execute { .. } => vec![QueueMessage::CopyTransfer { transfer_id: transfer.id }],
        Intent::CopyDone => vec![QueueMessage::VerifyTransfer { transfer_id: transfer.id }],
        Intent::VerifyOk => vec![QueueMessage::ShotGridComplete { transfer_id: transfer.id }],
        _ => Vec::new(),
    }
}
