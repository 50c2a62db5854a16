use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::facility::{FacilityFunction, FacilityId};
use crate::domain::request::{StressRequest, StressScope};

/// Identity of a stress target. Two requests compete for the same stress
/// window only when every component matches: a facility-wide marking never
/// absorbs a route, subcluster, or pincode marking, nor the reverse.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub facility_id: FacilityId,
    pub function: FacilityFunction,
    pub scope: StressScope,
}

impl ScopeKey {
    pub fn new(facility_id: FacilityId, function: FacilityFunction, scope: StressScope) -> Self {
        Self { facility_id, function, scope }
    }

    pub fn of(request: &StressRequest) -> Self {
        Self::new(request.facility_id.clone(), request.facility_function, request.scope.clone())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.facility_id.0, self.function.as_str(), self.scope)
    }
}
