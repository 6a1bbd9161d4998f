// src/server/routes.rs
//! Axum router configuration for conveyor's HTTP surface (spec §6).
//! Every route but `/health` and `/auth/login` sits behind
//! `auth_middleware::require_auth`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use super::auth_middleware::require_auth;
use super::handlers::{approvals, auth, health, scanning, transfer_ops, transfers, upload};
use super::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let protected = Router::new()
        .route("/transfers", post(transfers::create).get(transfers::list))
        .route("/transfers/:id", get(transfers::detail).delete(transfers::cancel))
        .route("/transfers/:id/upload", post(upload::upload))
        .route("/transfers/:id/submit", post(transfers::submit))
        .route("/transfers/:id/files", get(transfers::files))
        .route("/transfers/:id/approvals", get(transfers::approval_chain))
        .route("/approvals/pending", get(approvals::pending))
        .route("/approvals/:id/approve", post(approvals::approve))
        .route("/approvals/:id/reject", post(approvals::reject))
        .route("/approvals/:id/override", post(approvals::admin_override))
        .route("/scanning/:id/start", post(scanning::start))
        .route("/scanning/:id/complete", post(scanning::complete))
        .route("/transfer-ops/:id/execute", post(transfer_ops::execute))
        .route("/transfer-ops/:id/complete", post(transfer_ops::complete))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .merge(protected)
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
