// src/shotgrid.rs

//! ShotGrid is specified as an opaque read/write directory of
//! projects/shots/assets/tasks/versions/notes (spec §1, §6): we own the
//! trait shape, not its internals. `HttpShotGridClient` issues REST
//! calls over `reqwest`; failures are logged and swallowed per spec
//! §6's tolerance rule — the core never rolls back state on a ShotGrid
//! error. `NullShotGridClient` is used when no base URL is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ShotGridConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVersion {
    pub code: String,
    pub description: String,
    pub path: String,
}

#[async_trait]
pub trait ShotGridClient: Send + Sync {
    async fn find_project(&self, project_id: &str) -> Option<Project>;
    async fn find_entity(&self, entity_type: &str, entity_id: &str) -> Option<Entity>;
    /// Update the linked entity's status (delivery completion writes "dlvr").
    async fn update_status(&self, entity_type: &str, entity_id: &str, status: &str);
    async fn create_version(&self, entity_id: &str, version: NewVersion);
    async fn create_note(&self, entity_id: &str, subject: &str, body: &str);
}

/// Issues REST calls against a configured ShotGrid base URL. Every
/// method swallows its own errors (logged at `warn`) since spec §6
/// forbids rolling back transfer state on a ShotGrid failure.
pub struct HttpShotGridClient {
    http: reqwest::Client,
    base_url: String,
    script_name: String,
    script_key: String,
}

impl HttpShotGridClient {
    pub fn new(config: &ShotGridConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            base_url,
            script_name: config.script_name.clone().unwrap_or_default(),
            script_key: config.script_key.clone().unwrap_or_default(),
        })
    }

    fn auth_query(&self) -> [(&'static str, &str); 2] {
        [("script_name", &self.script_name), ("script_key", &self.script_key)]
    }
}

#[async_trait]
impl ShotGridClient for HttpShotGridClient {
    async fn find_project(&self, project_id: &str) -> Option<Project> {
        let url = format!("{}/api/v1/projects/{project_id}", self.base_url);
        match self.http.get(&url).query(&self.auth_query()).send().await {
            Ok(resp) if resp.status().is_success() => resp.json::<Project>().await.ok(),
            Ok(resp) => {
                warn!(status = %resp.status(), %project_id, "shotgrid find_project failed");
                None
            }
            Err(e) => {
                warn!(error = %e, %project_id, "shotgrid find_project unreachable");
                None
            }
        }
    }

    async fn find_entity(&self, entity_type: &str, entity_id: &str) -> Option<Entity> {
        let url = format!("{}/api/v1/{entity_type}/{entity_id}", self.base_url);
        match self.http.get(&url).query(&self.auth_query()).send().await {
            Ok(resp) if resp.status().is_success() => resp.json::<Entity>().await.ok(),
            Ok(resp) => {
                warn!(status = %resp.status(), %entity_type, %entity_id, "shotgrid find_entity failed");
                None
            }
            Err(e) => {
                warn!(error = %e, %entity_type, %entity_id, "shotgrid find_entity unreachable");
                None
            }
        }
    }

    async fn update_status(&self, entity_type: &str, entity_id: &str, status: &str) {
        let url = format!("{}/api/v1/{entity_type}/{entity_id}", self.base_url);
        let body = serde_json::json!({ "status": status });
        if let Err(e) = self
            .http
            .put(&url)
            .query(&self.auth_query())
            .json(&body)
            .send()
            .await
        {
            warn!(error = %e, %entity_type, %entity_id, "shotgrid update_status failed");
        }
    }

    async fn create_version(&self, entity_id: &str, version: NewVersion) {
        let url = format!("{}/api/v1/versions", self.base_url);
        let body = serde_json::json!({
            "entity_id": entity_id,
            "code": version.code,
            "description": version.description,
            "path": version.path,
        });
        if let Err(e) = self
            .http
            .post(&url)
            .query(&self.auth_query())
            .json(&body)
            .send()
            .await
        {
            warn!(error = %e, %entity_id, "shotgrid create_version failed");
        }
    }

    async fn create_note(&self, entity_id: &str, subject: &str, body: &str) {
        let url = format!("{}/api/v1/notes", self.base_url);
        let payload = serde_json::json!({ "entity_id": entity_id, "subject": subject, "content": body });
        if let Err(e) = self
            .http
            .post(&url)
            .query(&self.auth_query())
            .json(&payload)
            .send()
            .await
        {
            warn!(error = %e, %entity_id, "shotgrid create_note failed");
        }
    }
}

/// Degraded mode when no ShotGrid base URL is configured. Every read
/// returns `None` (callers fall back to the `"unlinked"` slug); every
/// write is a no-op, matching the scanner's configured-disabled mode.
pub struct NullShotGridClient;

#[async_trait]
impl ShotGridClient for NullShotGridClient {
    async fn find_project(&self, _project_id: &str) -> Option<Project> {
        None
    }

    async fn find_entity(&self, _entity_type: &str, _entity_id: &str) -> Option<Entity> {
        None
    }

    async fn update_status(&self, _entity_type: &str, _entity_id: &str, _status: &str) {}

    async fn create_version(&self, _entity_id: &str, _version: NewVersion) {}

    async fn create_note(&self, _entity_id: &str, _subject: &str, _body: &str) {}
}

/// Builds the configured client: `HttpShotGridClient` when a base URL
/// is set, `NullShotGridClient` otherwise.
pub fn build_client(config: &ShotGridConfig) -> Box<dyn ShotGridClient> {
    match HttpShotGridClient::new(config) {
        Some(client) => Box::new(client),
        None => Box::new(NullShotGridClient),
    }
}
