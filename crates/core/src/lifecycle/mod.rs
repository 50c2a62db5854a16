pub mod conflict;
pub mod controller;
pub mod merge;
pub mod states;
pub mod validation;

use chrono::{DateTime, Utc};

use crate::domain::user::UserId;

pub use conflict::find_conflict;
pub use controller::{StressEngine, Transition, TransitionKind};
pub use merge::{resolve_merge, MergeOutcome};
pub use states::{transition, LifecycleEvent, TransitionError};
pub use validation::{validate_submission, StressSubmission};

/// An administrator's ruling on one pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub admin: UserId,
    pub comments: Option<String>,
    pub at: DateTime<Utc>,
}

impl Decision {
    /// Blank comments are treated as absent.
    pub fn new(admin: UserId, comments: Option<String>, at: DateTime<Utc>) -> Self {
        let comments = comments
            .map(|comments| comments.trim().to_owned())
            .filter(|comments| !comments.is_empty());
        Self { admin, comments, at }
    }
}
