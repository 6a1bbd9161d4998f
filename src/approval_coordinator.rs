// src/approval_coordinator.rs

//! Thin facade over `state_machine::apply` for the three human approval
//! stages and the admin override (spec §4.2). Every mutating method
//! opens its own `Store::with_txn` and enqueues the returned queue
//! messages only after that transaction has committed.

use std::sync::Arc;

use crate::catalog::{approvals, transfers};
use crate::db::Store;
use crate::domain::{Approval, ApprovalStatus, RequiredRole, Transfer};
use crate::error::{Error, Result};
use crate::policy;
use crate::queue::TaskQueue;
use crate::state_machine::{self, Actor, Intent};

pub struct ApprovalCoordinator {
    store: Arc<Store>,
    queue: TaskQueue,
}

impl ApprovalCoordinator {
    pub fn new(store: Arc<Store>) -> Self {
        let queue = TaskQueue::new(store.clone());
        Self { store, queue }
    }

    /// Transfers currently on `actor`'s plate: the pending-stage status
    /// matching their role, per the visibility table (spec §4.2, §4.6).
    pub fn pending_for(&self, actor: Actor) -> Result<Vec<Transfer>> {
        let Some(role) = actor.role() else {
            return Ok(Vec::new());
        };
        let conn = self.store.connection()?;
        match policy::visible_statuses(role) {
            policy::Visibility::All => {
                use crate::domain::Status;
                transfers::list_for_statuses(
                    &conn,
                    &[Status::PendingTeamLead, Status::PendingSupervisor, Status::PendingLineProducer],
                )
            }
            policy::Visibility::OwnedOnly => Ok(Vec::new()),
            policy::Visibility::StatusesOrOwned(statuses) | policy::Visibility::Statuses(statuses) => {
                transfers::list_for_statuses(&conn, &statuses)
            }
        }
    }

    pub fn approve(&self, transfer_id: i64, required_role: RequiredRole, actor: Actor, comment: Option<String>) -> Result<Transfer> {
        let outcome = self.store.with_txn(|txn| {
            state_machine::apply(txn, transfer_id, Intent::Approve { required_role, comment }, actor)
        })?;
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(outcome.transfer)
    }

    pub fn reject(&self, transfer_id: i64, required_role: RequiredRole, actor: Actor, reason: String) -> Result<Transfer> {
        let outcome = self.store.with_txn(|txn| {
            state_machine::apply(txn, transfer_id, Intent::Reject { required_role, reason }, actor)
        })?;
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(outcome.transfer)
    }

    /// The ordered five-stage view, filling any missing stage row with
    /// a synthetic pending entry (should not happen once seeding is in
    /// place, but keeps callers defensive against a partial seed).
    pub fn approval_chain(&self, transfer_id: i64) -> Result<Vec<Approval>> {
        let conn = self.store.connection()?;
        let chain = approvals::list_for_transfer(&conn, transfer_id)?;
        let mut out = Vec::with_capacity(RequiredRole::ALL.len());
        for role in RequiredRole::ALL {
            match chain.iter().find(|a| a.required_role == role) {
                Some(a) => out.push(a.clone()),
                None => out.push(synthetic_pending(transfer_id, role)),
            }
        }
        Ok(out)
    }

    pub fn admin_override(
        &self,
        transfer_id: i64,
        target: crate::domain::Status,
        admin: Actor,
        reason: String,
    ) -> Result<Transfer> {
        if reason.trim().is_empty() {
            return Err(Error::precondition("override requires a reason"));
        }
        let outcome = self.store.with_txn(|txn| {
            state_machine::apply(txn, transfer_id, Intent::Override { target, reason }, admin)
        })?;
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(outcome.transfer)
    }
}

fn synthetic_pending(transfer_id: i64, required_role: RequiredRole) -> Approval {
    Approval {
        id: 0,
        transfer_id,
        required_role,
        approver_id: None,
        status: ApprovalStatus::Pending,
        comment: None,
        decided_at: None,
        created_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{transfers, users};
    use crate::domain::{NewTransfer, NewUser, Role, Status};

    fn setup() -> (ApprovalCoordinator, i64, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db.sqlite")).unwrap());
        let conn = store.connection().unwrap();
        let artist_id = users::insert(
            &conn,
            &NewUser { username: "sarah".into(), display_name: "Sarah".into(), email: "s@x".into(), role: Role::Artist },
            "h",
        ).unwrap();
        let reference = transfers::next_reference(&conn).unwrap();
        let transfer_id = transfers::insert(
            &conn,
            &reference,
            "/staging/TRF-00001",
            &NewTransfer {
                name: "Scene_042".into(), category: "vfx_assets".into(), priority: 0, artist_id,
                tags: vec![], shotgrid_project_id: None, shotgrid_entity_id: None, shotgrid_entity_type: None,
            },
        ).unwrap();
        crate::catalog::approvals::seed_chain(&conn, transfer_id).unwrap();
        transfers::increment_counts(&conn, transfer_id, 1, 100).unwrap();
        drop(conn);
        (ApprovalCoordinator::new(store), artist_id, transfer_id)
    }

    #[test]
    fn approve_advances_stage() {
        let (coordinator, artist_id, transfer_id) = setup();
        state_machine::apply(
            &coordinator.store.connection().unwrap(),
            transfer_id,
            Intent::Submit,
            Actor::User { id: artist_id, role: Role::Artist },
        ).unwrap();

        let updated = coordinator
            .approve(transfer_id, RequiredRole::TeamLead, Actor::User { id: 99, role: Role::TeamLead }, None)
            .unwrap();
        assert_eq!(updated.status, Status::PendingSupervisor);
    }

    #[test]
    fn approval_chain_has_five_entries_in_role_order() {
        let (coordinator, _, transfer_id) = setup();
        let chain = coordinator.approval_chain(transfer_id).unwrap();
        assert_eq!(chain.len(), 5);
        assert_eq!(chain[0].required_role, RequiredRole::TeamLead);
        assert_eq!(chain[4].required_role, RequiredRole::ItTeam);
    }

    #[test]
    fn override_requires_nonempty_reason() {
        let (coordinator, _, transfer_id) = setup();
        let err = coordinator.admin_override(
            transfer_id,
            Status::Approved,
            Actor::User { id: 1, role: Role::Admin },
            "  ".into(),
        );
        assert!(matches!(err, Err(Error::Precondition(_))));
    }
}
