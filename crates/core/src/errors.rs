use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::facility::{FacilityFunction, StressLevel};
use crate::domain::request::{RequestStatus, StressRequestId};
use crate::domain::user::UserRole;
use crate::lifecycle::states::TransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown facility `{facility_id}`")]
    UnknownFacility { facility_id: String },
    #[error("facility `{facility_id}` does not operate {function}")]
    FunctionNotAvailable { facility_id: String, function: FacilityFunction },
    #[error("stress level `{level}` is not available for {function}")]
    LevelNotAllowed { function: FacilityFunction, level: StressLevel },
    #[error("stress level `{level}` requires `{field}`")]
    MissingScope { level: StressLevel, field: &'static str },
    #[error("stress level `{level}` must not carry `{field}`")]
    UnexpectedScope { level: StressLevel, field: &'static str },
    #[error("unknown route `{route_id}`")]
    UnknownRoute { route_id: String },
    #[error("unknown subcluster `{subcluster_id}`")]
    UnknownSubcluster { subcluster_id: String },
    #[error("pincode `{pincode}` is not served by facility `{facility_id}`")]
    PincodeNotServed { facility_id: String, pincode: String },
    #[error("start date {start_date} is in the past (today is {today})")]
    StartDateInPast { start_date: NaiveDate, today: NaiveDate },
    #[error("extension days must be at least 1")]
    ExtensionTooShort,
    #[error("extension of {requested} days exceeds the current maximum of {max} days")]
    ExtensionTooLong { requested: u32, max: u32 },
    #[error("stress window starting {start_date} cannot be represented")]
    WindowOutOfRange { start_date: NaiveDate },
    #[error("stress reason is required")]
    MissingReason,
    #[error("max extension days must be in range 1..=365, got {value}")]
    MaxExtensionOutOfRange { value: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("user `{user_id}` with role `{role:?}` may not {action}")]
    RoleNotPermitted { user_id: String, role: UserRole, action: &'static str },
    #[error("user `{user_id}` is not assigned to facility `{facility_id}`")]
    FacilityNotAssigned { user_id: String, facility_id: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("stress request `{0}` not found")]
    NotFound(StressRequestId),
    #[error("stress request `{id}` is {status:?}; only pending requests can be decided")]
    StateConflict { id: StressRequestId, status: RequestStatus },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<TransitionError> for EngineError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::Terminal { id, status, .. } => Self::StateConflict { id, status },
        }
    }
}

impl EngineError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::StateConflict { .. } => "state_conflict",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The stress request could not be found.",
            Self::Conflict { .. } => "The stress request has already been decided.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Engine(error) => {
                let message = error.to_string();
                match error {
                    EngineError::Validation(_) => {
                        Self::BadRequest { message, correlation_id: unassigned() }
                    }
                    EngineError::Authorization(_) => {
                        Self::Forbidden { message, correlation_id: unassigned() }
                    }
                    EngineError::NotFound(_) => {
                        Self::NotFound { message, correlation_id: unassigned() }
                    }
                    EngineError::StateConflict { .. } => {
                        Self::Conflict { message, correlation_id: unassigned() }
                    }
                    EngineError::InvariantViolation(_) => {
                        Self::Internal { message, correlation_id: unassigned() }
                    }
                }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
