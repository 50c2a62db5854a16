use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::facility::{FacilityFunction, FacilityId, RouteId, StressLevel, SubclusterId};
use crate::domain::user::UserId;
use crate::errors::ValidationError;
use crate::scope::ScopeKey;
use crate::window::StressWindow;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StressRequestId(pub String);

impl StressRequestId {
    pub fn generate() -> Self {
        Self(format!("SR-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for StressRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What part of a facility is stressed. Each non-facility level carries the
/// one discriminator it needs, so a request can never hold two of them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "value", rename_all = "snake_case")]
pub enum StressScope {
    Facility,
    Route(RouteId),
    Subcluster(SubclusterId),
    Pincode(String),
}

impl StressScope {
    pub fn level(&self) -> StressLevel {
        match self {
            Self::Facility => StressLevel::Facility,
            Self::Route(_) => StressLevel::Route,
            Self::Subcluster(_) => StressLevel::Subcluster,
            Self::Pincode(_) => StressLevel::Pincode,
        }
    }

    pub fn discriminator(&self) -> Option<&str> {
        match self {
            Self::Facility => None,
            Self::Route(route_id) => Some(&route_id.0),
            Self::Subcluster(subcluster_id) => Some(&subcluster_id.0),
            Self::Pincode(pincode) => Some(pincode),
        }
    }

    /// Same scope with its discriminator trimmed, so padded and bare values
    /// share one scope key. A blank discriminator is rejected.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let (route_id, subcluster_id, pincode) = match self {
            Self::Facility => (None, None, None),
            Self::Route(route_id) => (Some(route_id.0.as_str()), None, None),
            Self::Subcluster(subcluster_id) => (None, Some(subcluster_id.0.as_str()), None),
            Self::Pincode(pincode) => (None, None, Some(pincode.as_str())),
        };
        Self::from_parts(self.level(), route_id, subcluster_id, pincode)
    }

    /// Builds a scope from the loose boundary shape `(level, route?, subcluster?, pincode?)`.
    /// The discriminator matching `level` must be present and non-blank; any other
    /// discriminator must be absent.
    pub fn from_parts(
        level: StressLevel,
        route_id: Option<&str>,
        subcluster_id: Option<&str>,
        pincode: Option<&str>,
    ) -> Result<Self, ValidationError> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|value| !value.is_empty())
        }

        let route_id = present(route_id);
        let subcluster_id = present(subcluster_id);
        let pincode = present(pincode);

        let unexpected = |field: &'static str| -> Result<Self, ValidationError> {
            Err(ValidationError::UnexpectedScope { level, field })
        };
        let missing = |field: &'static str| ValidationError::MissingScope { level, field };

        match level {
            StressLevel::Facility => {
                if route_id.is_some() {
                    return unexpected("route_id");
                }
                if subcluster_id.is_some() {
                    return unexpected("subcluster_id");
                }
                if pincode.is_some() {
                    return unexpected("pincode");
                }
                Ok(Self::Facility)
            }
            StressLevel::Route => {
                if subcluster_id.is_some() {
                    return unexpected("subcluster_id");
                }
                if pincode.is_some() {
                    return unexpected("pincode");
                }
                let route_id = route_id.ok_or_else(|| missing("route_id"))?;
                Ok(Self::Route(RouteId(route_id.to_owned())))
            }
            StressLevel::Subcluster => {
                if route_id.is_some() {
                    return unexpected("route_id");
                }
                if pincode.is_some() {
                    return unexpected("pincode");
                }
                let subcluster_id = subcluster_id.ok_or_else(|| missing("subcluster_id"))?;
                Ok(Self::Subcluster(SubclusterId(subcluster_id.to_owned())))
            }
            StressLevel::Pincode => {
                if route_id.is_some() {
                    return unexpected("route_id");
                }
                if subcluster_id.is_some() {
                    return unexpected("subcluster_id");
                }
                let pincode = pincode.ok_or_else(|| missing("pincode"))?;
                Ok(Self::Pincode(pincode.to_owned()))
            }
        }
    }
}

impl fmt::Display for StressScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.discriminator() {
            Some(value) => write!(f, "{}:{value}", self.level()),
            None => write!(f, "{}", self.level()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Merged,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Administrator decision recorded when a request leaves `Pending`. The
/// surviving record of a merge has its disposition overwritten by each merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    pub admin_approver_id: UserId,
    pub admin_comments: Option<String>,
    pub approval_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrailAction {
    Submitted,
    Approved,
    Rejected,
    MergedInto { target: StressRequestId },
    ExtendedByMerge { merged_request: StressRequestId, previous: StressWindow, updated: StressWindow },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub actor: UserId,
    pub at: DateTime<Utc>,
    pub action: TrailAction,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressRequest {
    pub id: StressRequestId,
    pub facility_id: FacilityId,
    pub facility_function: FacilityFunction,
    pub scope: StressScope,
    pub start_date: NaiveDate,
    pub extension_days: u32,
    pub reason: String,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub disposition: Option<Disposition>,
    pub merged_into: Option<StressRequestId>,
    pub trail: Vec<TrailEntry>,
    pub version: u32,
}

impl StressRequest {
    pub fn stress_level(&self) -> StressLevel {
        self.scope.level()
    }

    pub fn window(&self) -> StressWindow {
        StressWindow::saturating(self.start_date, self.extension_days)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.window().end
    }

    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::of(self)
    }

    pub fn is_in_force(&self, as_of: NaiveDate) -> bool {
        self.status == RequestStatus::Approved && self.window().is_active(as_of)
    }

    pub(crate) fn record(
        &mut self,
        actor: &UserId,
        at: DateTime<Utc>,
        action: TrailAction,
        note: Option<String>,
    ) {
        self.trail.push(TrailEntry { actor: actor.clone(), at, action, note });
        self.version = self.version.saturating_add(1);
    }

    /// Flattens the decision trail into the single free-text comment line
    /// shown to operators.
    pub fn render_comments(&self) -> String {
        self.trail.iter().filter_map(render_entry).collect::<Vec<_>>().join("; ")
    }
}

fn render_entry(entry: &TrailEntry) -> Option<String> {
    let note = entry.note.as_deref().map(str::trim).filter(|note| !note.is_empty());
    match &entry.action {
        TrailAction::Submitted => None,
        TrailAction::Approved | TrailAction::Rejected => note.map(str::to_owned),
        TrailAction::MergedInto { target } => Some(format!(
            "Request approved; its period was merged into existing stress marking {target}. Admin comment for this action: {}",
            note.unwrap_or("None")
        )),
        TrailAction::ExtendedByMerge { merged_request, .. } => Some(format!(
            "Extended/Updated on {} by {} (merging request {merged_request}). Admin note: {}.",
            entry.at.format("%B %-d, %Y"),
            entry.actor,
            note.unwrap_or("-")
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{RequestStatus, StressRequest, StressRequestId, StressScope, TrailAction};
    use crate::domain::facility::{FacilityFunction, FacilityId, RouteId, StressLevel};
    use crate::domain::user::UserId;
    use crate::errors::ValidationError;
    use crate::window::StressWindow;

    #[test]
    fn scope_from_parts_requires_the_matching_discriminator() {
        assert_eq!(
            StressScope::from_parts(StressLevel::Route, Some("route-fm-1"), None, None),
            Ok(StressScope::Route(RouteId("route-fm-1".to_owned())))
        );
        assert_eq!(
            StressScope::from_parts(StressLevel::Route, None, None, None),
            Err(ValidationError::MissingScope { level: StressLevel::Route, field: "route_id" })
        );
        assert_eq!(
            StressScope::from_parts(StressLevel::Pincode, None, None, Some("   ")),
            Err(ValidationError::MissingScope { level: StressLevel::Pincode, field: "pincode" })
        );
        assert_eq!(
            StressScope::from_parts(StressLevel::Facility, None, None, None),
            Ok(StressScope::Facility)
        );
    }

    #[test]
    fn scope_from_parts_rejects_extra_discriminators() {
        assert_eq!(
            StressScope::from_parts(StressLevel::Facility, None, Some("sc-north"), None),
            Err(ValidationError::UnexpectedScope {
                level: StressLevel::Facility,
                field: "subcluster_id"
            })
        );
        assert_eq!(
            StressScope::from_parts(StressLevel::Subcluster, Some("route-1"), Some("sc-1"), None),
            Err(ValidationError::UnexpectedScope {
                level: StressLevel::Subcluster,
                field: "route_id"
            })
        );
    }

    #[test]
    fn status_round_trips_through_storage_keys() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Merged,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Merged.is_terminal());
    }

    #[test]
    fn comments_render_from_the_trail() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).single().expect("timestamp");
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("date");
        let mut request = StressRequest {
            id: StressRequestId("SR-1".to_owned()),
            facility_id: FacilityId("facility-1".to_owned()),
            facility_function: FacilityFunction::FmPickup,
            scope: StressScope::Facility,
            start_date: start,
            extension_days: 5,
            reason: "Space Stress".to_owned(),
            submitted_by: UserId("user-ops-1".to_owned()),
            submitted_at: at,
            status: RequestStatus::Approved,
            disposition: None,
            merged_into: None,
            trail: Vec::new(),
            version: 0,
        };
        let admin = UserId("user-admin-1".to_owned());

        request.record(&admin, at, TrailAction::Submitted, None);
        request.record(&admin, at, TrailAction::Approved, Some("approved for peak".to_owned()));
        request.record(
            &admin,
            at,
            TrailAction::ExtendedByMerge {
                merged_request: StressRequestId("SR-2".to_owned()),
                previous: StressWindow::saturating(start, 5),
                updated: StressWindow::saturating(start, 8),
            },
            None,
        );

        assert_eq!(request.version, 3);
        assert_eq!(
            request.render_comments(),
            "approved for peak; Extended/Updated on January 2, 2026 by user-admin-1 (merging request SR-2). Admin note: -."
        );
    }
}
