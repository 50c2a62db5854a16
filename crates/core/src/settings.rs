//! The administrator-tunable ceiling on `extension_days`.

use crate::domain::user::Actor;
use crate::errors::{AuthorizationError, EngineError, ValidationError};

pub const DEFAULT_MAX_EXTENSION_DAYS: u32 = 30;
pub const MIN_MAX_EXTENSION_DAYS: u32 = 1;
pub const MAX_MAX_EXTENSION_DAYS: u32 = 365;

pub fn validate_max_extension_days(value: u32) -> Result<u32, ValidationError> {
    if (MIN_MAX_EXTENSION_DAYS..=MAX_MAX_EXTENSION_DAYS).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::MaxExtensionOutOfRange { value })
    }
}

/// Checks both who is asking and what they ask for. Existing records are
/// never revalidated against a new ceiling.
pub fn authorize_max_extension_change(actor: &Actor, value: u32) -> Result<u32, EngineError> {
    if !actor.is_administrator() {
        return Err(AuthorizationError::RoleNotPermitted {
            user_id: actor.user_id.0.clone(),
            role: actor.role,
            action: "change the maximum extension days",
        }
        .into());
    }
    Ok(validate_max_extension_days(value)?)
}

#[cfg(test)]
mod tests {
    use super::{authorize_max_extension_change, validate_max_extension_days};
    use crate::domain::user::{Actor, UserRole};
    use crate::errors::{EngineError, ValidationError};

    #[test]
    fn range_is_inclusive() {
        assert_eq!(validate_max_extension_days(1), Ok(1));
        assert_eq!(validate_max_extension_days(365), Ok(365));
        assert_eq!(
            validate_max_extension_days(0),
            Err(ValidationError::MaxExtensionOutOfRange { value: 0 })
        );
        assert_eq!(
            validate_max_extension_days(366),
            Err(ValidationError::MaxExtensionOutOfRange { value: 366 })
        );
    }

    #[test]
    fn only_administrators_change_the_ceiling() {
        let admin = Actor::new("user-admin-1", UserRole::Administrator);
        assert_eq!(authorize_max_extension_change(&admin, 45), Ok(45));

        let head = Actor::new("user-fh-fm", UserRole::FacilityHead).with_facility("facility-1");
        assert!(matches!(
            authorize_max_extension_change(&head, 45),
            Err(EngineError::Authorization(_))
        ));
    }
}
