use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{RequestStatus, StressRequestId};

/// Administrator decisions that move a request out of `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Approve,
    Reject,
    MergeInto,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::MergeInto => "merge_into",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("request `{id}` is {status:?} and cannot {}", event.as_str())]
    Terminal { id: StressRequestId, status: RequestStatus, event: LifecycleEvent },
}

/// Every status except `Pending` is terminal, so the table only has rows for
/// `Pending`.
pub fn transition(
    id: &StressRequestId,
    current: RequestStatus,
    event: LifecycleEvent,
) -> Result<RequestStatus, TransitionError> {
    use LifecycleEvent::{Approve, MergeInto, Reject};
    use RequestStatus::{Approved, Merged, Pending, Rejected};

    match (current, event) {
        (Pending, Approve) => Ok(Approved),
        (Pending, Reject) => Ok(Rejected),
        (Pending, MergeInto) => Ok(Merged),
        (Approved | Rejected | Merged, _) => {
            Err(TransitionError::Terminal { id: id.clone(), status: current, event })
        }
    }
}
