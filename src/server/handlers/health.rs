// src/server/handlers/health.rs

use axum::http::StatusCode;

pub async fn health() -> StatusCode {
    StatusCode::OK
}
