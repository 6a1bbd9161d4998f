// src/policy.rs

//! Pure, side-effect-free visibility and authorization predicates (spec
//! §4.6). Kept separate from the catalog and state machine so the same
//! rule can gate both the list query and the detail-read 403 check —
//! the two are required to agree (spec §8).

use crate::domain::{RequiredRole, Role, Status, Transfer};

/// What a role may see. `All` means no filter; `Owned` restricts to the
/// actor's own transfers; `Statuses` restricts to a status allowlist,
/// optionally widened by ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    OwnedOnly,
    StatusesOrOwned(Vec<Status>),
    Statuses(Vec<Status>),
}

/// The visibility rule for a role, straight out of spec §4.6. `admin`
/// sees everything; `artist` sees only their own transfers; `team_lead`
/// sees transfers pending at their stage plus their own; `supervisor`
/// and `line_producer` see their pending stage plus everything that has
/// left `uploaded`; `data_team` and `it_team` see a fixed status window
/// around their stage of the pipeline.
pub fn visible_statuses(role: Role) -> Visibility {
    match role {
        Role::Admin => Visibility::All,
        Role::Artist => Visibility::OwnedOnly,
        Role::TeamLead => Visibility::StatusesOrOwned(vec![Status::PendingTeamLead]),
        Role::Supervisor => Visibility::Statuses(all_except_uploaded_plus(Status::PendingSupervisor)),
        Role::LineProducer => {
            Visibility::Statuses(all_except_uploaded_plus(Status::PendingLineProducer))
        }
        Role::DataTeam => Visibility::Statuses(vec![
            Status::Approved,
            Status::Scanning,
            Status::ScanPassed,
            Status::ScanFailed,
            Status::ReadyForTransfer,
        ]),
        Role::ItTeam => Visibility::Statuses(vec![
            Status::ReadyForTransfer,
            Status::Transferring,
            Status::Verifying,
            Status::Transferred,
        ]),
    }
}

fn all_except_uploaded_plus(extra: Status) -> Vec<Status> {
    let mut statuses: Vec<Status> = [
        Status::PendingTeamLead,
        Status::PendingSupervisor,
        Status::PendingLineProducer,
        Status::Approved,
        Status::Scanning,
        Status::ScanPassed,
        Status::ScanFailed,
        Status::ReadyForTransfer,
        Status::Transferring,
        Status::Verifying,
        Status::Transferred,
        Status::Rejected,
        Status::Cancelled,
    ]
    .to_vec();
    if !statuses.contains(&extra) {
        statuses.push(extra);
    }
    statuses
}

/// Whether `actor` may see `transfer` under the detail-read check. Must
/// stay in lock step with the list-query filter built from
/// [`visible_statuses`] so the §8 universal holds: a transfer appears in
/// the list iff its detail read does not 403.
pub fn can_view(actor_role: Role, actor_id: i64, transfer: &Transfer) -> bool {
    match visible_statuses(actor_role) {
        Visibility::All => true,
        Visibility::OwnedOnly => transfer.artist_id == actor_id,
        Visibility::StatusesOrOwned(statuses) => {
            statuses.contains(&transfer.status) || transfer.artist_id == actor_id
        }
        Visibility::Statuses(statuses) => statuses.contains(&transfer.status),
    }
}

/// Whether `role` may decide the approval stage for `required_role`.
/// Admin may act at any stage; every other role must match exactly.
pub fn can_decide_stage(actor_role: Role, required_role: RequiredRole) -> bool {
    actor_role.is_admin() || actor_role == required_role.matching_role()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn transfer_with(status: Status, artist_id: i64) -> Transfer {
        Transfer {
            id: 1,
            reference: "TRF-00001".into(),
            name: "n".into(),
            category: "c".into(),
            status,
            priority: 0,
            artist_id,
            staging_path: "/s".into(),
            production_path: None,
            total_files: 0,
            total_size_bytes: 0,
            scan_result: None,
            scan_passed: None,
            transfer_verified: None,
            transfer_method: None,
            rejection_reason: None,
            tags: vec![],
            shotgrid_project_id: None,
            shotgrid_entity_id: None,
            shotgrid_entity_type: None,
            transfer_started_at: None,
            transfer_completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn artist_sees_only_own_transfers() {
        let mine = transfer_with(Status::Uploaded, 1);
        let theirs = transfer_with(Status::Uploaded, 2);
        assert!(can_view(Role::Artist, 1, &mine));
        assert!(!can_view(Role::Artist, 1, &theirs));
    }

    #[test]
    fn team_lead_sees_pending_stage_and_own() {
        let pending = transfer_with(Status::PendingTeamLead, 2);
        let own_uploaded = transfer_with(Status::Uploaded, 1);
        let unrelated = transfer_with(Status::PendingSupervisor, 2);
        assert!(can_view(Role::TeamLead, 1, &pending));
        assert!(can_view(Role::TeamLead, 1, &own_uploaded));
        assert!(!can_view(Role::TeamLead, 1, &unrelated));
    }

    #[test]
    fn supervisor_does_not_see_uploaded_unless_pending_stage() {
        let uploaded = transfer_with(Status::Uploaded, 2);
        let approved = transfer_with(Status::Approved, 2);
        assert!(!can_view(Role::Supervisor, 1, &uploaded));
        assert!(can_view(Role::Supervisor, 1, &approved));
    }

    #[test]
    fn admin_sees_everything() {
        let t = transfer_with(Status::Uploaded, 99);
        assert!(can_view(Role::Admin, 1, &t));
    }

    #[test]
    fn admin_can_decide_any_stage() {
        assert!(can_decide_stage(Role::Admin, RequiredRole::DataTeam));
        assert!(can_decide_stage(Role::TeamLead, RequiredRole::TeamLead));
        assert!(!can_decide_stage(Role::TeamLead, RequiredRole::Supervisor));
    }
}
