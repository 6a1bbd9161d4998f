// src/config.rs

//! Layered configuration: defaults, then an optional TOML file, then
//! environment variable overrides. Grounded on the teacher's
//! `server::ServerConfig`/`transaction::TransactionConfig` pattern of a
//! plain struct with a `Default` impl plus small constructors, rather
//! than a generic config-loading framework.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub staging_root: PathBuf,
    pub production_root: PathBuf,
    pub max_upload_size_bytes: u64,
    pub scanner: ScannerConfig,
    pub copy: CopyConfig,
    pub shotgrid: ShotGridConfig,
    pub smtp: SmtpConfig,
    pub queue: QueueConfig,
    pub watchdog: WatchdogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            db_path: PathBuf::from("/var/lib/conveyor/conveyor.db"),
            staging_root: PathBuf::from("/var/lib/conveyor/staging"),
            production_root: PathBuf::from("/mnt/production"),
            max_upload_size_bytes: 500 * 1024 * 1024 * 1024, // 500 GiB
            scanner: ScannerConfig::default(),
            copy: CopyConfig::default(),
            shotgrid: ShotGridConfig::default(),
            smtp: SmtpConfig::default(),
            queue: QueueConfig::default(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

/// The stale-transfer sweep (SPEC_FULL §4.14): flags any transfer that
/// has sat in `scanning`/`transferring`/`verifying` past
/// `stale_after_hours` without a worker advancing it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub stale_after_hours: i64,
    pub sweep_interval_secs: u64,
}

impl WatchdogConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { stale_after_hours: 24, sweep_interval_secs: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Path to the clamscan binary. `None` enters degraded mode.
    pub clamscan_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            clamscan_path: Some(PathBuf::from("/usr/bin/clamscan")),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    Rsync,
    Copy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub method: TransferMethod,
    pub rsync_path: PathBuf,
    pub wall_clock_timeout_secs: u64,
}

impl CopyConfig {
    pub fn wall_clock_timeout(&self) -> Duration {
        Duration::from_secs(self.wall_clock_timeout_secs)
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            method: TransferMethod::Copy,
            rsync_path: PathBuf::from("/usr/bin/rsync"),
            wall_clock_timeout_secs: 7200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ShotGridConfig {
    /// Base URL of the ShotGrid REST API. `None` uses the null client.
    pub base_url: Option<String>,
    pub script_name: Option<String>,
    pub script_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SmtpConfig {
    /// SMTP relay address. `None` uses the null mailer.
    pub relay: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub scanning_concurrency: usize,
    pub transfer_concurrency: usize,
    pub notifications_concurrency: usize,
    pub poll_interval_ms: u64,
    pub lease_duration_secs: u64,
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scanning_concurrency: 1,
            transfer_concurrency: 1,
            notifications_concurrency: 16,
            poll_interval_ms: 500,
            lease_duration_secs: 600,
        }
    }
}

impl Config {
    /// Load defaults, overlay an optional TOML file, then environment
    /// variables prefixed `CONVEYOR_` (e.g. `CONVEYOR_BIND_ADDR`).
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::Validation(format!("reading config {path:?}: {e}")))?;
            config = toml::from_str(&text)
                .map_err(|e| Error::Validation(format!("parsing config {path:?}: {e}")))?;
        }

        if let Ok(addr) = std::env::var("CONVEYOR_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| Error::Validation(format!("CONVEYOR_BIND_ADDR: {e}")))?;
        }
        if let Ok(path) = std::env::var("CONVEYOR_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CONVEYOR_STAGING_ROOT") {
            config.staging_root = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CONVEYOR_PRODUCTION_ROOT") {
            config.production_root = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("CONVEYOR_SHOTGRID_URL") {
            config.shotgrid.base_url = Some(url);
        }
        if let Ok(relay) = std::env::var("CONVEYOR_SMTP_RELAY") {
            config.smtp.relay = Some(relay);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.queue.scanning_concurrency, 1);
        assert_eq!(config.queue.transfer_concurrency, 1);
        assert!(config.scanner.clamscan_path.is_some());
    }

    #[test]
    fn env_overrides_db_path() {
        std::env::set_var("CONVEYOR_DB_PATH", "/tmp/conveyor-test.db");
        let config = Config::load(None).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/conveyor-test.db"));
        std::env::remove_var("CONVEYOR_DB_PATH");
    }
}
