// src/telemetry.rs

//! Tracing subscriber initialization, shared by the server and CLI
//! binaries. Grounded on the teacher's `tracing-subscriber` use in its
//! `bin/*.rs` entry points.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global tracing subscriber. Safe to call once per process;
/// a second call is a silent no-op (mirrors typical daemon startup code
/// that may run init twice under test harnesses).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
