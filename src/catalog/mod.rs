// src/catalog/mod.rs

//! Typed accessors over the SQLite tables, grounded on the teacher's
//! `db::models` convention: plain functions taking `&rusqlite::Connection`
//! (which a `rusqlite::Transaction` derefs to), one module per entity,
//! no ORM layer in between.

pub mod approvals;
pub mod files;
pub mod history;
pub mod notifications;
pub mod transfers;
pub mod users;
