// src/workers/mod.rs

//! The three queue-driven workers of spec §4.3-§4.5: scan, copy
//! (prepare + execute), and verify. Each owns its own `Store` handle
//! and `TaskQueue` and is driven by a poll loop in `server::run_server`.
//! `watchdog` is a fourth, timer-driven (not queue-driven) background
//! task added in SPEC_FULL §4.14.

pub mod copy;
pub mod scan;
pub mod verify;
pub mod watchdog;
