// src/state_machine/transition.rs

//! The edge set of spec §4.1 as an exhaustive `match`, not a `HashMap`
//! of tuples or a string comparison — the teacher's Design Notes call
//! this out explicitly for role dispatch, and it applies just as well
//! to the transition table itself.

use crate::domain::{Role, Status};
use crate::policy;

use super::{Actor, Intent};

/// Step 2 of `apply`: does this `(status, intent, actor)` triple name a
/// legal edge, and if so what's the next status? Returns `None` to mean
/// "no such edge" — the caller turns that into `PreconditionFailed`.
/// Step 3's intent-specific predicates (approval row state, reason
/// length, ownership) are checked separately once the edge itself is
/// known to exist.
pub fn transition(status: Status, intent: &Intent, actor: Actor) -> Option<Status> {
    use Status::*;

    match (status, intent) {
        (Uploaded, Intent::Submit) if is_role(actor, Role::Artist) => Some(PendingTeamLead),

        (PendingTeamLead, Intent::Approve { required_role, .. })
            if *required_role == crate::domain::RequiredRole::TeamLead && can_decide(actor, *required_role) =>
        {
            Some(PendingSupervisor)
        }
        (PendingTeamLead, Intent::Reject { required_role, .. })
            if *required_role == crate::domain::RequiredRole::TeamLead && can_decide(actor, *required_role) =>
        {
            Some(Rejected)
        }

        (PendingSupervisor, Intent::Approve { required_role, .. })
            if *required_role == crate::domain::RequiredRole::Supervisor && can_decide(actor, *required_role) =>
        {
            Some(PendingLineProducer)
        }
        (PendingSupervisor, Intent::Reject { required_role, .. })
            if *required_role == crate::domain::RequiredRole::Supervisor && can_decide(actor, *required_role) =>
        {
            Some(Rejected)
        }

        (PendingLineProducer, Intent::Approve { required_role, .. })
            if *required_role == crate::domain::RequiredRole::LineProducer && can_decide(actor, *required_role) =>
        {
            Some(Approved)
        }
        (PendingLineProducer, Intent::Reject { required_role, .. })
            if *required_role == crate::domain::RequiredRole::LineProducer && can_decide(actor, *required_role) =>
        {
            Some(Rejected)
        }

        (Approved, Intent::StartScan) if is_role(actor, Role::DataTeam) || is_role(actor, Role::Admin) => {
            Some(Scanning)
        }

        (Scanning, Intent::CompleteScan { all_clean: true, .. }) if matches!(actor, Actor::Worker) => {
            Some(ScanPassed)
        }
        (Scanning, Intent::CompleteScan { all_clean: false, .. }) if matches!(actor, Actor::Worker) => {
            Some(ScanFailed)
        }

        (ScanPassed, Intent::Prepare { .. }) if matches!(actor, Actor::Worker) => Some(ReadyForTransfer),

        (ReadyForTransfer, Intent::Execute { .. })
            if is_role(actor, Role::ItTeam) || is_role(actor, Role::Admin) =>
        {
            Some(Transferring)
        }

        (Transferring, Intent::CopyDone) if matches!(actor, Actor::Worker) => Some(Verifying),
        (Transferring, Intent::CopyError { .. }) if matches!(actor, Actor::Worker) => Some(ScanFailed),

        (Verifying, Intent::VerifyOk) if matches!(actor, Actor::Worker) => Some(Transferred),
        (Verifying, Intent::VerifyMismatch { .. }) if matches!(actor, Actor::Worker) => Some(ScanFailed),

        (_, Intent::Cancel) if !status.is_terminal() => Some(Cancelled),

        (_, Intent::Override { target, .. }) if is_role(actor, Role::Admin) => Some(*target),

        _ => None,
    }
}

fn is_role(actor: Actor, role: Role) -> bool {
    actor.role() == Some(role)
}

fn can_decide(actor: Actor, required_role: crate::domain::RequiredRole) -> bool {
    match actor.role() {
        Some(role) => policy::can_decide_stage(role, required_role),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequiredRole;

    #[test]
    fn submit_requires_artist_role() {
        let wrong = Actor::User { id: 1, role: Role::TeamLead };
        assert_eq!(transition(Status::Uploaded, &Intent::Submit, wrong), None);

        let right = Actor::User { id: 1, role: Role::Artist };
        assert_eq!(transition(Status::Uploaded, &Intent::Submit, right), Some(Status::PendingTeamLead));
    }

    #[test]
    fn admin_can_decide_any_human_stage() {
        let admin = Actor::User { id: 1, role: Role::Admin };
        let intent = Intent::Approve { required_role: RequiredRole::Supervisor, comment: None };
        assert_eq!(transition(Status::PendingSupervisor, &intent, admin), Some(Status::PendingLineProducer));
    }

    #[test]
    fn worker_only_intents_reject_human_actors() {
        let human = Actor::User { id: 1, role: Role::DataTeam };
        let intent = Intent::CompleteScan { scan_result: serde_json::json!({}), all_clean: true };
        assert_eq!(transition(Status::Scanning, &intent, human), None);
        assert_eq!(transition(Status::Scanning, &intent, Actor::Worker), Some(Status::ScanPassed));
    }

    #[test]
    fn cancel_blocked_on_terminal_states() {
        let owner = Actor::User { id: 1, role: Role::Artist };
        assert_eq!(transition(Status::Transferred, &Intent::Cancel, owner), None);
        assert_eq!(transition(Status::Uploaded, &Intent::Cancel, owner), Some(Status::Cancelled));
    }

    #[test]
    fn override_requires_admin() {
        let artist = Actor::User { id: 1, role: Role::Artist };
        let intent = Intent::Override { target: Status::Approved, reason: "x".into() };
        assert_eq!(transition(Status::PendingSupervisor, &intent, artist), None);

        let admin = Actor::User { id: 1, role: Role::Admin };
        assert_eq!(transition(Status::PendingSupervisor, &intent, admin), Some(Status::Approved));
    }
}
