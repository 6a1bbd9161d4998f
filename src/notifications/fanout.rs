// src/notifications/fanout.rs

//! Recipient resolution and enqueue for state transitions (spec §4.1
//! step 7, expanded in SPEC_FULL §4.9). Runs inside the same
//! transaction as the transition it reacts to so a notification row
//! never outlives the state change that caused it.

use rusqlite::Connection;

use crate::catalog::{approvals, notifications, users};
use crate::domain::{ApprovalStatus, NewNotification, NotificationType, Role, Transfer};
use crate::error::Result;
use crate::queue::QueueMessage;
use crate::state_machine::{Actor, Intent};

/// The transition that just committed its status write, handed to
/// `fanout` so it can decide who to notify.
pub struct TransitionEvent<'a> {
    pub transfer: Transfer,
    pub intent: &'a Intent,
    pub actor: Actor,
}

/// Insert one notification row per resolved recipient and a matching
/// `SendNotification` queue message. Returns the ids so a caller could
/// enqueue them directly, though in the current design `apply` folds
/// the queue messages in with its own return value via
/// [`crate::state_machine::apply`].
pub fn fanout(conn: &Connection, event: &TransitionEvent<'_>) -> Result<Vec<QueueMessage>> {
    let recipients = recipients_for(conn, event)?;
    let mut messages = Vec::with_capacity(recipients.len());

    for (user_id, notification_type, title, message) in recipients {
        let id = notifications::insert(
            conn,
            &NewNotification {
                user_id,
                transfer_id: Some(event.transfer.id),
                notification_type,
                title,
                message,
            },
        )?;
        messages.push(QueueMessage::SendNotification { notification_id: id });
        crate::queue::TaskQueue::enqueue_in(conn, messages.last().unwrap())?;
    }

    Ok(messages)
}

type Recipient = (i64, NotificationType, String, String);

fn recipients_for(conn: &Connection, event: &TransitionEvent<'_>) -> Result<Vec<Recipient>> {
    let transfer = &event.transfer;
    let mut out = Vec::new();

    match event.intent {
        Intent::Submit => {
            for user in users::list_by_role(conn, Role::TeamLead)? {
                out.push(notify(user.id, NotificationType::ApprovalRequired, transfer, "team lead review needed"));
            }
        }
        Intent::Approve { required_role, .. } => {
            let next_role = match required_role {
                crate::domain::RequiredRole::TeamLead => Some(Role::Supervisor),
                crate::domain::RequiredRole::Supervisor => Some(Role::LineProducer),
                crate::domain::RequiredRole::LineProducer => Some(Role::DataTeam),
                _ => None,
            };
            if let Some(role) = next_role {
                for user in users::list_by_role(conn, role)? {
                    out.push(notify(user.id, NotificationType::ApprovalRequired, transfer, "review needed"));
                }
            }
        }
        Intent::Reject { .. } => {
            out.push(notify(transfer.artist_id, NotificationType::Rejected, transfer, "transfer rejected"));
            for approver in prior_approvers(conn, transfer.id)? {
                out.push(notify(approver, NotificationType::Rejected, transfer, "transfer rejected downstream"));
            }
        }
        Intent::StartScan => {
            out.push(notify(transfer.artist_id, NotificationType::ScanStarted, transfer, "virus scan started"));
        }
        Intent::CompleteScan { all_clean: true, .. } => {
            out.push(notify(transfer.artist_id, NotificationType::ScanComplete, transfer, "scan passed"));
        }
        Intent::CompleteScan { all_clean: false, .. } => {
            out.push(notify(transfer.artist_id, NotificationType::ScanFailed, transfer, "scan failed"));
            for user in data_and_it_team(conn)? {
                out.push(notify(user, NotificationType::ScanFailed, transfer, "scan failed"));
            }
        }
        Intent::Execute { .. } => {
            out.push(notify(transfer.artist_id, NotificationType::TransferStarted, transfer, "transfer started"));
        }
        Intent::CopyError { .. } => {
            for user in data_and_it_team(conn)? {
                out.push(notify(user, NotificationType::TransferFailed, transfer, "copy failed"));
            }
        }
        Intent::VerifyOk => {
            out.push(notify(transfer.artist_id, NotificationType::TransferComplete, transfer, "transfer complete"));
            for approver in prior_approvers(conn, transfer.id)? {
                out.push(notify(approver, NotificationType::TransferComplete, transfer, "transfer complete"));
            }
            for user in data_and_it_team(conn)? {
                out.push(notify(user, NotificationType::TransferComplete, transfer, "transfer complete"));
            }
        }
        Intent::VerifyMismatch { mismatched_files } => {
            let preview = mismatched_files.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
            for user in data_and_it_team(conn)? {
                out.push(notify(
                    user,
                    NotificationType::TransferFailed,
                    transfer,
                    &format!("verification failed: {preview}"),
                ));
            }
        }
        Intent::Cancel => {
            out.push(notify(transfer.artist_id, NotificationType::System, transfer, "transfer cancelled"));
        }
        Intent::Override { reason, .. } => {
            out.push(notify(
                transfer.artist_id,
                NotificationType::System,
                transfer,
                &format!("admin override: {reason}"),
            ));
        }
        Intent::Prepare { .. } | Intent::CopyDone => {}
    }

    Ok(out)
}

fn notify(user_id: i64, notification_type: NotificationType, transfer: &Transfer, message: &str) -> Recipient {
    (
        user_id,
        notification_type,
        format!("{} ({})", transfer.name, transfer.reference),
        message.to_string(),
    )
}

fn data_and_it_team(conn: &Connection) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> = users::list_by_role(conn, Role::DataTeam)?.into_iter().map(|u| u.id).collect();
    ids.extend(users::list_by_role(conn, Role::ItTeam)?.into_iter().map(|u| u.id));
    Ok(ids)
}

/// Every user who decided a (non-skipped) approval stage so far,
/// de-duplicated, in stage order.
fn prior_approvers(conn: &Connection, transfer_id: i64) -> Result<Vec<i64>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for stage in approvals::list_for_transfer(conn, transfer_id)? {
        if stage.status == ApprovalStatus::Approved {
            if let Some(approver_id) = stage.approver_id {
                if seen.insert(approver_id) {
                    out.push(approver_id);
                }
            }
        }
    }
    Ok(out)
}
