use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::facility::FacilityId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Ops,
    FacilityHead,
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ops => "ops",
            Self::FacilityHead => "facility_head",
            Self::Administrator => "administrator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "ops" => Some(Self::Ops),
            "facility_head" | "facilityhead" => Some(Self::FacilityHead),
            "administrator" | "admin" => Some(Self::Administrator),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub assigned_facility_id: Option<FacilityId>,
}

/// Identity of whoever invokes a transition. Authentication happens upstream;
/// the engine trusts the role it is handed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
    pub assigned_facility_id: Option<FacilityId>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self { user_id: UserId(user_id.into()), role, assigned_facility_id: None }
    }

    pub fn with_facility(mut self, facility_id: impl Into<String>) -> Self {
        self.assigned_facility_id = Some(FacilityId(facility_id.into()));
        self
    }

    pub fn is_administrator(&self) -> bool {
        self.role == UserRole::Administrator
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
            assigned_facility_id: user.assigned_facility_id.clone(),
        }
    }
}
