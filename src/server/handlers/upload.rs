// src/server/handlers/upload.rs

//! POST /transfers/{id}/upload: multipart file ingestion (spec §4.8,
//! §6). Each part's body stream is adapted into an `AsyncRead` via
//! `StreamReader` so `FileIngestor::ingest` never has to know it came
//! from an HTTP multipart body.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use tokio_util::io::StreamReader;

use crate::domain::TransferFile;
use crate::error::Error;
use crate::server::auth_middleware::AuthUser;
use crate::server::AppState;
use crate::state_machine::Actor;

use super::ApiError;

/// The cumulative-size-cap message `FileIngestor` raises as a generic
/// `Precondition`. Spec §6 calls out 413 specifically for this case, so
/// it is recognized here rather than folded into the blanket 400 the
/// rest of `Precondition` maps to.
const UPLOAD_TOO_LARGE: &str = "cumulative upload size exceeds the configured limit";

pub async fn upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Vec<TransferFile>>, Response> {
    let actor = Actor::User { id: user.id, role: user.role };
    let mut uploaded = Vec::new();

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            ApiError(Error::precondition(format!("malformed multipart body: {e}"))).into_response()
        })?;
        let Some(field) = field else { break };

        let filename = field.file_name().unwrap_or("upload.bin").to_string();
        let stream = field.map(|r| r.map_err(|e| std::io::Error::other(e.to_string())));
        let reader = StreamReader::new(stream);

        let file = state
            .ingestor
            .ingest(id, actor, &filename, reader)
            .await
            .map_err(to_response)?;
        uploaded.push(file);
    }

    Ok(Json(uploaded))
}

fn to_response(e: Error) -> Response {
    if let Error::Precondition(ref msg) = e {
        if msg == UPLOAD_TOO_LARGE {
            return (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()).into_response();
        }
    }
    ApiError(e).into_response()
}
