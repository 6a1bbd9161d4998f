// tests/approval_flow.rs

//! End-to-end exercise of the transfer pipeline: upload, the five-stage
//! human approval chain, scan, copy, and verify, driven through the
//! same public collaborators the HTTP handlers call (`ApprovalCoordinator`,
//! `state_machine::apply`, the three queue workers) rather than through
//! HTTP itself.

use std::io::Cursor;
use std::sync::Arc;

use conveyor::approval_coordinator::ApprovalCoordinator;
use conveyor::catalog::{approvals, files, transfers, users};
use conveyor::config::{CopyConfig, TransferMethod};
use conveyor::db::Store;
use conveyor::domain::{ApprovalStatus, NewTransfer, NewUser, RequiredRole, Role, Status};
use conveyor::ingestion::FileIngestor;
use conveyor::shotgrid::NullShotGridClient;
use conveyor::state_machine::{self, Actor, Intent};
use conveyor::workers::copy::CopyWorker;
use conveyor::workers::scan::{DisabledScanner, ScanWorker};
use conveyor::workers::verify::VerifyWorker;

struct Fixture {
    store: Arc<Store>,
    coordinator: ApprovalCoordinator,
    scan_worker: ScanWorker,
    copy_worker: CopyWorker,
    verify_worker: VerifyWorker,
    artist: i64,
    team_lead: i64,
    supervisor: i64,
    line_producer: i64,
    data_team: i64,
    it_team: i64,
    transfer_id: i64,
}

async fn setup() -> (tempfile::TempDir, Fixture) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("conveyor.db")).unwrap());

    let conn = store.connection().unwrap();
    let mk = |role: Role, name: &str| {
        users::insert(
            &conn,
            &NewUser {
                username: name.into(),
                display_name: name.into(),
                email: format!("{name}@studio.example"),
                role,
            },
            "hash",
        )
        .unwrap()
    };
    let artist = mk(Role::Artist, "artist");
    let team_lead = mk(Role::TeamLead, "team_lead");
    let supervisor = mk(Role::Supervisor, "supervisor");
    let line_producer = mk(Role::LineProducer, "line_producer");
    let data_team = mk(Role::DataTeam, "data_team");
    let it_team = mk(Role::ItTeam, "it_team");

    let reference = transfers::next_reference(&conn).unwrap();
    let staging_path = dir.path().join("staging").join(&reference);
    let transfer_id = transfers::insert(
        &conn,
        &reference,
        staging_path.to_string_lossy().as_ref(),
        &NewTransfer {
            name: "Scene_042".into(),
            category: "vfx_assets".into(),
            priority: 0,
            artist_id: artist,
            tags: vec![],
            shotgrid_project_id: None,
            shotgrid_entity_id: None,
            shotgrid_entity_type: None,
        },
    )
    .unwrap();
    approvals::seed_chain(&conn, transfer_id).unwrap();
    drop(conn);

    let ingestor = FileIngestor::new(store.clone(), 10 * 1024 * 1024);
    ingestor
        .ingest(transfer_id, Actor::User { id: artist, role: Role::Artist }, "render.exr", Cursor::new(b"frame-data".to_vec()))
        .await
        .unwrap();

    let production_root = dir.path().join("production");
    let copy_config = CopyConfig { method: TransferMethod::Copy, rsync_path: "/usr/bin/rsync".into(), wall_clock_timeout_secs: 60 };

    let fixture = Fixture {
        coordinator: ApprovalCoordinator::new(store.clone()),
        scan_worker: ScanWorker::new(store.clone(), Box::new(DisabledScanner)),
        copy_worker: CopyWorker::new(store.clone(), copy_config, production_root, Arc::new(NullShotGridClient)),
        verify_worker: VerifyWorker::new(store.clone()),
        store,
        artist,
        team_lead,
        supervisor,
        line_producer,
        data_team,
        it_team,
        transfer_id,
    };
    (dir, fixture)
}

/// Carries a transfer from `uploaded` through `transferred`, asserting
/// every intermediate status and that the history log records each step.
#[tokio::test]
async fn happy_path_reaches_transferred_with_full_history() {
    let (_dir, f) = setup().await;

    state_machine::apply(
        &f.store.connection().unwrap(),
        f.transfer_id,
        Intent::Submit,
        Actor::User { id: f.artist, role: Role::Artist },
    )
    .unwrap();

    let t = f
        .coordinator
        .approve(f.transfer_id, RequiredRole::TeamLead, Actor::User { id: f.team_lead, role: Role::TeamLead }, None)
        .unwrap();
    assert_eq!(t.status, Status::PendingSupervisor);

    let t = f
        .coordinator
        .approve(f.transfer_id, RequiredRole::Supervisor, Actor::User { id: f.supervisor, role: Role::Supervisor }, None)
        .unwrap();
    assert_eq!(t.status, Status::PendingLineProducer);

    let t = f
        .coordinator
        .approve(f.transfer_id, RequiredRole::LineProducer, Actor::User { id: f.line_producer, role: Role::LineProducer }, None)
        .unwrap();
    assert_eq!(t.status, Status::Approved);

    state_machine::apply(
        &f.store.connection().unwrap(),
        f.transfer_id,
        Intent::StartScan,
        Actor::User { id: f.data_team, role: Role::DataTeam },
    )
    .unwrap();

    f.scan_worker.run(f.transfer_id).await.unwrap();
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert_eq!(t.status, Status::ScanPassed);
    drop(conn);

    f.copy_worker.prepare(f.transfer_id).await.unwrap();
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert_eq!(t.status, Status::ReadyForTransfer);
    drop(conn);

    f.copy_worker.execute(f.transfer_id, Actor::User { id: f.it_team, role: Role::ItTeam }).unwrap();
    f.copy_worker.perform_copy(f.transfer_id).await.unwrap();
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert_eq!(t.status, Status::Verifying);
    drop(conn);

    f.verify_worker.run(f.transfer_id).await.unwrap();
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert_eq!(t.status, Status::Transferred);

    let history = conveyor::catalog::history::list_for_transfer(&conn, f.transfer_id).unwrap();
    assert!(history.len() >= 9, "expected at least 9 history entries, got {}", history.len());

    let chain = approvals::list_for_transfer(&conn, f.transfer_id).unwrap();
    assert!(chain.iter().all(|a| a.status == ApprovalStatus::Approved), "every stage should be approved by the time a transfer reaches transferred: {chain:?}");
}

#[tokio::test]
async fn rejection_at_team_lead_notifies_artist_and_stops_chain() {
    let (_dir, f) = setup().await;
    state_machine::apply(
        &f.store.connection().unwrap(),
        f.transfer_id,
        Intent::Submit,
        Actor::User { id: f.artist, role: Role::Artist },
    )
    .unwrap();

    let t = f
        .coordinator
        .reject(
            f.transfer_id,
            RequiredRole::TeamLead,
            Actor::User { id: f.team_lead, role: Role::TeamLead },
            "missing color pass".into(),
        )
        .unwrap();
    assert_eq!(t.status, Status::Rejected);
    assert_eq!(t.rejection_reason.as_deref(), Some("missing color pass"));

    let chain = approvals::list_for_transfer(&f.store.connection().unwrap(), f.transfer_id).unwrap();
    let team_lead_decision = chain.iter().find(|a| a.required_role == RequiredRole::TeamLead).unwrap();
    assert_eq!(team_lead_decision.status, ApprovalStatus::Rejected);
}

#[tokio::test]
async fn checksum_mismatch_at_verify_fails_the_transfer() {
    let (dir, f) = setup().await;
    state_machine::apply(
        &f.store.connection().unwrap(),
        f.transfer_id,
        Intent::Submit,
        Actor::User { id: f.artist, role: Role::Artist },
    )
    .unwrap();
    for (role_id, role) in [
        (f.team_lead, Role::TeamLead),
        (f.supervisor, Role::Supervisor),
        (f.line_producer, Role::LineProducer),
    ] {
        let required = match role {
            Role::TeamLead => RequiredRole::TeamLead,
            Role::Supervisor => RequiredRole::Supervisor,
            Role::LineProducer => RequiredRole::LineProducer,
            _ => unreachable!(),
        };
        f.coordinator.approve(f.transfer_id, required, Actor::User { id: role_id, role }, None).unwrap();
    }

    state_machine::apply(
        &f.store.connection().unwrap(),
        f.transfer_id,
        Intent::StartScan,
        Actor::User { id: f.data_team, role: Role::DataTeam },
    )
    .unwrap();
    f.scan_worker.run(f.transfer_id).await.unwrap();
    f.copy_worker.prepare(f.transfer_id).await.unwrap();
    f.copy_worker.execute(f.transfer_id, Actor::User { id: f.it_team, role: Role::ItTeam }).unwrap();
    f.copy_worker.perform_copy(f.transfer_id).await.unwrap();

    // Corrupt the copied file in production so the re-hash at verify fails.
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    let transfer_files = files::list_for_transfer(&conn, f.transfer_id).unwrap();
    drop(conn);
    let production_file = std::path::Path::new(t.production_path.as_ref().unwrap()).join(&transfer_files[0].filename);
    std::fs::write(&production_file, b"tampered").unwrap();
    let _ = dir;

    f.verify_worker.run(f.transfer_id).await.unwrap();
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert_eq!(t.status, Status::ScanFailed);
}

#[tokio::test]
async fn admin_override_jumps_directly_to_target_status() {
    let (_dir, f) = setup().await;
    let admin = Actor::User { id: 999, role: Role::Admin };
    let t = f.coordinator.admin_override(f.transfer_id, Status::Cancelled, admin, "duplicate submission".into()).unwrap();
    assert_eq!(t.status, Status::Cancelled);
}

#[tokio::test]
async fn visibility_hides_other_artists_transfers() {
    let (_dir, f) = setup().await;
    let conn = f.store.connection().unwrap();
    let t = transfers::find_by_id(&conn, f.transfer_id).unwrap().unwrap();
    assert!(conveyor::policy::can_view(Role::Artist, f.artist, &t));
    assert!(!conveyor::policy::can_view(Role::Artist, f.artist + 1, &t));
    assert!(conveyor::policy::can_view(Role::Admin, 0, &t));
}
