// src/domain/user.rs

use chrono::{DateTime, Utc};

use super::role::Role;

#[derive(Debug, Clone, serde::Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when provisioning a user. Password hashing and LDAP
/// lookups are the authenticator's concern (see [`crate::auth`]), not the
/// catalog's.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}
