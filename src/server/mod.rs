// src/server/mod.rs

//! RequestSurface (SPEC_FULL §4.10): the Axum HTTP adapter plus the
//! process entry point that drives it. `run_server` mirrors the
//! teacher's `run_server` shape — build shared state, spawn background
//! loops, serve — generalized from one eviction loop to three
//! queue-driven worker loops (scan, transfer, notifications) joined
//! with the HTTP listener via `tokio::try_join!`.

pub mod auth_middleware;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::approval_coordinator::ApprovalCoordinator;
use crate::auth::LocalAuthenticator;
use crate::catalog::{notifications, users};
use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use crate::ingestion::FileIngestor;
use crate::notifications::mailer::{self, Mailer};
use crate::queue::{LeasedTask, QueueConcurrency, QueueMessage, QueueName, TaskQueue};
use crate::shotgrid::{self, ShotGridClient};
use crate::workers::copy::CopyWorker;
use crate::workers::scan::{self, ScanWorker};
use crate::workers::verify::VerifyWorker;
use crate::workers::watchdog::StaleTransferWatchdog;

pub use routes::create_router;

/// Everything a handler needs, shared via `State<Arc<AppState>>` the
/// same way the teacher shares `Arc<RwLock<ServerState>>`. No lock is
/// needed here: every field is already safe to share concurrently —
/// `Store` opens a fresh connection per call, and each worker holds
/// only an `Arc<Store>` plus its own `TaskQueue` handle.
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Config,
    pub authenticator: LocalAuthenticator,
    pub approvals: ApprovalCoordinator,
    pub ingestor: FileIngestor,
    pub scan_worker: ScanWorker,
    pub copy_worker: CopyWorker,
    pub verify_worker: VerifyWorker,
    pub mailer: Arc<dyn Mailer>,
    pub queue: TaskQueue,
    pub concurrency: Arc<QueueConcurrency>,
    pub watchdog: StaleTransferWatchdog,
}

/// Build every collaborator from `config` and serve the HTTP surface
/// alongside the three queue worker loops until either one stops.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&config.db_path)?);
    let shotgrid_client: Arc<dyn ShotGridClient> = Arc::from(shotgrid::build_client(&config.shotgrid));
    let mailer = mailer::build(&config.smtp);
    let scanner = scan::build_scanner(&config.scanner);

    let state = Arc::new(AppState {
        store: store.clone(),
        authenticator: LocalAuthenticator::new(store.clone()),
        approvals: ApprovalCoordinator::new(store.clone()),
        ingestor: FileIngestor::new(store.clone(), config.max_upload_size_bytes),
        scan_worker: ScanWorker::new(store.clone(), scanner),
        copy_worker: CopyWorker::new(
            store.clone(),
            config.copy.clone(),
            config.production_root.clone(),
            shotgrid_client,
        ),
        verify_worker: VerifyWorker::new(store.clone()),
        mailer,
        queue: TaskQueue::new(store.clone()),
        concurrency: Arc::new(QueueConcurrency::new(
            config.queue.scanning_concurrency,
            config.queue.transfer_concurrency,
            config.queue.notifications_concurrency,
        )),
        watchdog: StaleTransferWatchdog::new(store.clone(), config.watchdog.stale_after_hours),
        config: config.clone(),
    });

    let app = routes::create_router(state.clone());
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "conveyor listening");

    #[cfg(feature = "systemd")]
    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);

    let serve = async { axum::serve(listener, app).await.map_err(anyhow::Error::from) };

    let scanning = tokio::spawn(worker_loop(state.clone(), QueueName::Scanning));
    let transfer = tokio::spawn(worker_loop(state.clone(), QueueName::Transfer));
    let notif = tokio::spawn(worker_loop(state.clone(), QueueName::Notifications));
    let watchdog = tokio::spawn(watchdog_loop(state.clone()));

    tokio::try_join!(serve, flatten(scanning), flatten(transfer), flatten(notif), flatten(watchdog))?;
    Ok(())
}

/// Timer-driven, not queue-driven: sweeps on a fixed interval rather
/// than leasing rows, since there is no per-transfer task to pick up —
/// just a periodic scan for transfers nothing else is watching.
async fn watchdog_loop(state: Arc<AppState>) {
    let interval = state.config.watchdog.sweep_interval();
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = state.watchdog.sweep().await {
            warn!(error = %e, "stale-transfer watchdog sweep failed");
        }
    }
}

async fn flatten(handle: tokio::task::JoinHandle<()>) -> anyhow::Result<()> {
    handle.await.map_err(anyhow::Error::from)
}

/// One poll loop per queue name (SPEC_FULL §5): acquire a permit from
/// that queue's concurrency gate, lease the oldest ready row, and hand
/// it to a spawned task so the loop can go straight back to leasing.
/// Empty or error polls back off by `poll_interval` before retrying.
async fn worker_loop(state: Arc<AppState>, queue_name: QueueName) {
    let poll_interval = state.config.queue.poll_interval();
    let lease_duration = state.config.queue.lease_duration();

    loop {
        let permit = match state.concurrency.for_queue(queue_name).clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match state.queue.lease_next(queue_name, lease_duration) {
            Ok(Some(task)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    process_task(&state, task).await;
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) => {
                drop(permit);
                warn!(error = %e, queue = queue_name.as_str(), "failed to lease task");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

const MAX_ATTEMPTS: i64 = 5;

async fn process_task(state: &AppState, task: LeasedTask) {
    match dispatch(state, &task.message).await {
        Ok(()) => {
            if let Err(e) = state.queue.mark_done(task.id) {
                error!(error = %e, task_id = task.id, "failed to mark task done");
            }
        }
        Err(e) if task.attempts >= MAX_ATTEMPTS => {
            error!(error = %e, task_id = task.id, attempts = task.attempts, "task exhausted retries");
            if let Err(e) = state.queue.mark_dead(task.id) {
                error!(error = %e, task_id = task.id, "failed to mark task dead");
            }
        }
        Err(e) => {
            warn!(error = %e, task_id = task.id, attempts = task.attempts, "task failed, will retry after lease expiry");
        }
    }
}

async fn dispatch(state: &AppState, message: &QueueMessage) -> Result<()> {
    match message {
        QueueMessage::ScanTransfer { transfer_id } => state.scan_worker.run(*transfer_id).await,
        QueueMessage::PrepareTransfer { transfer_id } => state.copy_worker.prepare(*transfer_id).await,
        QueueMessage::CopyTransfer { transfer_id } => state.copy_worker.perform_copy(*transfer_id).await,
        QueueMessage::VerifyTransfer { transfer_id } => state.verify_worker.run(*transfer_id).await,
        QueueMessage::ShotGridComplete { transfer_id } => state.copy_worker.shotgrid_complete(*transfer_id).await,
        QueueMessage::SendNotification { notification_id } => send_notification(state, *notification_id).await,
    }
}

/// Drains a `SendNotification` message: looks up the notification and
/// its recipient's email and calls the configured `Mailer`. A missing
/// row is treated as already-handled, not an error — notifications are
/// never deleted by the application itself, so this only happens if a
/// row was already processed by a prior, since-expired lease holder.
async fn send_notification(state: &AppState, notification_id: i64) -> Result<()> {
    let conn = state.store.connection()?;
    let Some(notification) = notifications::find_by_id(&conn, notification_id)? else {
        return Ok(());
    };
    let Some(recipient) = users::find_by_id(&conn, notification.user_id)? else {
        return Ok(());
    };
    drop(conn);

    state
        .mailer
        .send(&recipient.email, &notification.title, &notification.message)
        .await?;

    let conn = state.store.connection()?;
    notifications::mark_email_sent(&conn, notification_id)?;
    Ok(())
}
