use crate::domain::request::{Disposition, RequestStatus, StressRequest, TrailAction};
use crate::errors::EngineError;
use crate::lifecycle::states::{transition, LifecycleEvent};
use crate::lifecycle::Decision;
use crate::notify::NotificationIntent;
use crate::window::StressWindow;

/// Result of folding an incoming request into the active record that already
/// covers its scope key. Both records are returned in their post-merge shape;
/// the caller commits them together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub surviving: StressRequest,
    pub merged: StressRequest,
    pub previous_window: StressWindow,
    pub window: StressWindow,
    pub notifications: Vec<NotificationIntent>,
}

pub fn resolve_merge(
    existing: &StressRequest,
    incoming: &StressRequest,
    decision: &Decision,
) -> Result<MergeOutcome, EngineError> {
    let merged_status = transition(&incoming.id, incoming.status, LifecycleEvent::MergeInto)?;
    if existing.status != RequestStatus::Approved {
        return Err(EngineError::InvariantViolation(format!(
            "merge target `{}` is {} rather than approved",
            existing.id,
            existing.status.as_str()
        )));
    }

    let previous_window = existing.window();
    let window = previous_window.union(&incoming.window());

    let mut surviving = existing.clone();
    surviving.start_date = window.start;
    surviving.extension_days = window.extension_days();
    surviving.disposition = Some(Disposition {
        admin_approver_id: decision.admin.clone(),
        admin_comments: existing
            .disposition
            .as_ref()
            .and_then(|disposition| disposition.admin_comments.clone()),
        approval_date: decision.at,
    });
    surviving.record(
        &decision.admin,
        decision.at,
        TrailAction::ExtendedByMerge {
            merged_request: incoming.id.clone(),
            previous: previous_window,
            updated: window,
        },
        decision.comments.clone(),
    );

    let mut merged = incoming.clone();
    merged.status = merged_status;
    merged.merged_into = Some(existing.id.clone());
    merged.disposition = Some(Disposition {
        admin_approver_id: decision.admin.clone(),
        admin_comments: decision.comments.clone(),
        approval_date: decision.at,
    });
    merged.record(
        &decision.admin,
        decision.at,
        TrailAction::MergedInto { target: existing.id.clone() },
        decision.comments.clone(),
    );

    let mut notifications = Vec::with_capacity(2);
    if existing.submitted_by != incoming.submitted_by {
        notifications.push(NotificationIntent::WindowExtended {
            recipient: existing.submitted_by.clone(),
            request_id: existing.id.clone(),
            facility_id: existing.facility_id.clone(),
            function: existing.facility_function,
            new_end: window.end,
        });
    }
    notifications.push(NotificationIntent::ApprovedAndMerged {
        recipient: incoming.submitted_by.clone(),
        request_id: incoming.id.clone(),
        surviving_id: existing.id.clone(),
        facility_id: incoming.facility_id.clone(),
        function: incoming.facility_function,
        new_end: window.end,
    });

    Ok(MergeOutcome { surviving, merged, previous_window, window, notifications })
}
