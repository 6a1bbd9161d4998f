// src/notifications/mod.rs

//! Notification fan-out (triggered inline from `state_machine::apply`)
//! and the outbound mail seam the `notifications` queue worker drives.

pub mod fanout;
pub mod mailer;

pub use mailer::Mailer;
