use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::domain::facility::{FacilityFunction, FacilityId};
use crate::domain::request::StressScope;
use crate::domain::user::{Actor, UserRole};
use crate::errors::{AuthorizationError, EngineError, ValidationError};
use crate::window::StressWindow;

/// A stress request as proposed by its submitter, before it has an id or a
/// status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressSubmission {
    pub facility_id: FacilityId,
    pub facility_function: FacilityFunction,
    pub scope: StressScope,
    pub start_date: NaiveDate,
    pub extension_days: u32,
    pub reason: String,
}

pub fn authorize_submitter(actor: &Actor, facility_id: &FacilityId) -> Result<(), AuthorizationError> {
    match actor.role {
        UserRole::Ops => Ok(()),
        UserRole::FacilityHead => match &actor.assigned_facility_id {
            Some(assigned) if assigned == facility_id => Ok(()),
            _ => Err(AuthorizationError::FacilityNotAssigned {
                user_id: actor.user_id.0.clone(),
                facility_id: facility_id.0.clone(),
            }),
        },
        UserRole::Administrator => Err(AuthorizationError::RoleNotPermitted {
            user_id: actor.user_id.0.clone(),
            role: actor.role,
            action: "submit stress requests",
        }),
    }
}

pub fn authorize_reviewer(actor: &Actor, action: &'static str) -> Result<(), AuthorizationError> {
    if actor.is_administrator() {
        Ok(())
    } else {
        Err(AuthorizationError::RoleNotPermitted {
            user_id: actor.user_id.0.clone(),
            role: actor.role,
            action,
        })
    }
}

/// Runs every precondition of `submit`; nothing is created unless this passes.
/// Returns the normalized scope the record must be stored under.
pub fn validate_submission(
    directory: &Directory,
    actor: &Actor,
    submission: &StressSubmission,
    max_extension_days: u32,
    today: NaiveDate,
) -> Result<StressScope, EngineError> {
    authorize_submitter(actor, &submission.facility_id)?;

    let facility = directory.facility(&submission.facility_id).ok_or_else(|| {
        ValidationError::UnknownFacility { facility_id: submission.facility_id.0.clone() }
    })?;
    let function = submission.facility_function;
    if !facility.performs(function) {
        return Err(ValidationError::FunctionNotAvailable {
            facility_id: facility.id.0.clone(),
            function,
        }
        .into());
    }

    let level = submission.scope.level();
    if !function.allows(level) {
        return Err(ValidationError::LevelNotAllowed { function, level }.into());
    }

    let scope = submission.scope.normalized()?;
    match &scope {
        StressScope::Facility => {}
        StressScope::Route(route_id) => {
            if directory.route(route_id).is_none() {
                return Err(ValidationError::UnknownRoute { route_id: route_id.0.clone() }.into());
            }
        }
        StressScope::Subcluster(subcluster_id) => {
            if directory.subcluster(subcluster_id).is_none() {
                return Err(ValidationError::UnknownSubcluster {
                    subcluster_id: subcluster_id.0.clone(),
                }
                .into());
            }
        }
        StressScope::Pincode(pincode) => {
            if !facility.serves_pincode(pincode) {
                return Err(ValidationError::PincodeNotServed {
                    facility_id: facility.id.0.clone(),
                    pincode: pincode.clone(),
                }
                .into());
            }
        }
    }

    if submission.start_date < today {
        return Err(ValidationError::StartDateInPast { start_date: submission.start_date, today }
            .into());
    }
    if submission.extension_days < 1 {
        return Err(ValidationError::ExtensionTooShort.into());
    }
    if submission.extension_days > max_extension_days {
        return Err(ValidationError::ExtensionTooLong {
            requested: submission.extension_days,
            max: max_extension_days,
        }
        .into());
    }
    if StressWindow::from_extension(submission.start_date, submission.extension_days).is_none() {
        return Err(ValidationError::WindowOutOfRange { start_date: submission.start_date }.into());
    }
    if submission.reason.trim().is_empty() {
        return Err(ValidationError::MissingReason.into());
    }

    Ok(scope)
}
