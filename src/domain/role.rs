// src/domain/role.rs

//! The closed set of roles a [`User`](super::user::User) can hold.
//!
//! Per the teacher's Design Notes instruction, roles are a sum type and
//! every place that dispatches on role (policy, state machine) does so
//! with an exhaustive `match`, not a string comparison.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Artist,
    TeamLead,
    Supervisor,
    LineProducer,
    DataTeam,
    ItTeam,
    /// Wildcard: permitted wherever any other role is permitted, plus
    /// the override transition.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Artist => "artist",
            Role::TeamLead => "team_lead",
            Role::Supervisor => "supervisor",
            Role::LineProducer => "line_producer",
            Role::DataTeam => "data_team",
            Role::ItTeam => "it_team",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" => Ok(Role::Artist),
            "team_lead" => Ok(Role::TeamLead),
            "supervisor" => Ok(Role::Supervisor),
            "line_producer" => Ok(Role::LineProducer),
            "data_team" => Ok(Role::DataTeam),
            "it_team" => Ok(Role::ItTeam),
            "admin" => Ok(Role::Admin),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

/// The five roles that own an approval stage. A strict subset of [`Role`]
/// (no `Artist`, no `Admin` — admin acts on stages, it does not own one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredRole {
    TeamLead,
    Supervisor,
    LineProducer,
    DataTeam,
    ItTeam,
}

impl RequiredRole {
    pub const ALL: [RequiredRole; 5] = [
        RequiredRole::TeamLead,
        RequiredRole::Supervisor,
        RequiredRole::LineProducer,
        RequiredRole::DataTeam,
        RequiredRole::ItTeam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredRole::TeamLead => "team_lead",
            RequiredRole::Supervisor => "supervisor",
            RequiredRole::LineProducer => "line_producer",
            RequiredRole::DataTeam => "data_team",
            RequiredRole::ItTeam => "it_team",
        }
    }

    /// True for the first three stages, which are decided by a human;
    /// the last two are flipped by worker completion instead.
    pub fn is_human_stage(&self) -> bool {
        matches!(
            self,
            RequiredRole::TeamLead | RequiredRole::Supervisor | RequiredRole::LineProducer
        )
    }

    pub fn matching_role(&self) -> Role {
        match self {
            RequiredRole::TeamLead => Role::TeamLead,
            RequiredRole::Supervisor => Role::Supervisor,
            RequiredRole::LineProducer => Role::LineProducer,
            RequiredRole::DataTeam => Role::DataTeam,
            RequiredRole::ItTeam => Role::ItTeam,
        }
    }
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequiredRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team_lead" => Ok(RequiredRole::TeamLead),
            "supervisor" => Ok(RequiredRole::Supervisor),
            "line_producer" => Ok(RequiredRole::LineProducer),
            "data_team" => Ok(RequiredRole::DataTeam),
            "it_team" => Ok(RequiredRole::ItTeam),
            other => Err(format!("invalid required role: {other}")),
        }
    }
}
