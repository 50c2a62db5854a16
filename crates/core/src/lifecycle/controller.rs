use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::domain::request::{
    Disposition, RequestStatus, StressRequest, StressRequestId, TrailAction,
};
use crate::domain::user::{Actor, UserRole};
use crate::errors::EngineError;
use crate::lifecycle::conflict::find_conflict;
use crate::lifecycle::merge::resolve_merge;
use crate::lifecycle::states::{transition, LifecycleEvent};
use crate::lifecycle::validation::{authorize_reviewer, validate_submission, StressSubmission};
use crate::lifecycle::Decision;
use crate::notify::NotificationIntent;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    Submitted,
    Approved,
    Rejected,
    Merged { surviving_id: StressRequestId },
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged { .. } => "merged",
        }
    }
}

/// Everything one committed transition produced: the records in their new
/// shape (to persist, in order) and the notifications still to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub request_id: StressRequestId,
    pub kind: TransitionKind,
    pub changed: Vec<StressRequest>,
    pub notifications: Vec<NotificationIntent>,
}

impl Transition {
    /// The record the caller addressed, in its post-transition shape.
    pub fn request(&self) -> Option<&StressRequest> {
        self.changed.iter().find(|record| record.id == self.request_id)
    }
}

/// Owns the request set and every mutation entry point. All preconditions are
/// checked before anything is written, so a rejected call leaves the set as
/// it was.
#[derive(Clone, Debug)]
pub struct StressEngine {
    directory: Directory,
    records: BTreeMap<StressRequestId, StressRequest>,
}

impl StressEngine {
    pub fn new(directory: Directory) -> Self {
        Self { directory, records: BTreeMap::new() }
    }

    /// Rehydrates from stored records without re-running submission checks.
    pub fn from_records(directory: Directory, records: Vec<StressRequest>) -> Self {
        let records = records.into_iter().map(|record| (record.id.clone(), record)).collect();
        Self { directory, records }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn submit(
        &mut self,
        submission: StressSubmission,
        actor: &Actor,
        max_extension_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        let scope =
            validate_submission(&self.directory, actor, &submission, max_extension_days, now.date_naive())?;

        let mut request = StressRequest {
            id: self.next_id(),
            facility_id: submission.facility_id,
            facility_function: submission.facility_function,
            scope,
            start_date: submission.start_date,
            extension_days: submission.extension_days,
            reason: submission.reason.trim().to_owned(),
            submitted_by: actor.user_id.clone(),
            submitted_at: now,
            status: RequestStatus::Pending,
            disposition: None,
            merged_into: None,
            trail: Vec::new(),
            version: 0,
        };
        request.record(&actor.user_id, now, TrailAction::Submitted, None);

        let notifications = self
            .directory
            .administrators()
            .map(|admin| NotificationIntent::awaiting_review(admin.id.clone(), &request))
            .collect();

        self.records.insert(request.id.clone(), request.clone());
        Ok(Transition {
            request_id: request.id.clone(),
            kind: TransitionKind::Submitted,
            changed: vec![request],
            notifications,
        })
    }

    /// Approves a pending request, merging it into the active approved record
    /// under the same scope key when there is one.
    pub fn approve(
        &mut self,
        id: &StressRequestId,
        actor: &Actor,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        authorize_reviewer(actor, "approve stress requests")?;
        let request = self.pending_request(id, LifecycleEvent::Approve)?;
        let decision = Decision::new(actor.user_id.clone(), comments, now);

        let conflict = find_conflict(self.records.values(), request, now.date_naive())?;
        if let Some(existing) = conflict {
            let outcome = resolve_merge(existing, request, &decision)?;
            let surviving_id = outcome.surviving.id.clone();
            tracing::info!(
                event_name = "lifecycle.request.merged",
                request_id = %id,
                surviving_id = %surviving_id,
                window = %outcome.window,
                actor = %actor.user_id,
                "approved request merged into active stress marking"
            );

            self.records.insert(outcome.surviving.id.clone(), outcome.surviving.clone());
            self.records.insert(outcome.merged.id.clone(), outcome.merged.clone());
            return Ok(Transition {
                request_id: id.clone(),
                kind: TransitionKind::Merged { surviving_id },
                changed: vec![outcome.surviving, outcome.merged],
                notifications: outcome.notifications,
            });
        }

        let mut approved = request.clone();
        approved.status = transition(id, approved.status, LifecycleEvent::Approve)?;
        self.decide(approved, decision, TrailAction::Approved, TransitionKind::Approved)
    }

    pub fn reject(
        &mut self,
        id: &StressRequestId,
        actor: &Actor,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        authorize_reviewer(actor, "reject stress requests")?;
        let request = self.pending_request(id, LifecycleEvent::Reject)?;
        let decision = Decision::new(actor.user_id.clone(), comments, now);

        let mut rejected = request.clone();
        rejected.status = transition(id, rejected.status, LifecycleEvent::Reject)?;
        self.decide(rejected, decision, TrailAction::Rejected, TransitionKind::Rejected)
    }

    fn decide(
        &mut self,
        mut request: StressRequest,
        decision: Decision,
        action: TrailAction,
        kind: TransitionKind,
    ) -> Result<Transition, EngineError> {
        request.disposition = Some(Disposition {
            admin_approver_id: decision.admin.clone(),
            admin_comments: decision.comments.clone(),
            approval_date: decision.at,
        });
        request.record(&decision.admin, decision.at, action, decision.comments);

        let notifications = vec![NotificationIntent::decided(&request)];
        self.records.insert(request.id.clone(), request.clone());
        Ok(Transition { request_id: request.id.clone(), kind, changed: vec![request], notifications })
    }

    fn pending_request(
        &self,
        id: &StressRequestId,
        event: LifecycleEvent,
    ) -> Result<&StressRequest, EngineError> {
        let request = self.records.get(id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
        transition(id, request.status, event)?;
        Ok(request)
    }

    fn next_id(&self) -> StressRequestId {
        loop {
            let id = StressRequestId::generate();
            if !self.records.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get(&self, id: &StressRequestId) -> Option<&StressRequest> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &StressRequest> {
        self.records.values()
    }

    /// Approval queue, newest submission first.
    pub fn pending(&self) -> Vec<&StressRequest> {
        newest_first(self.records.values().filter(|record| record.status == RequestStatus::Pending))
    }

    /// Administrators and ops see every request; a facility head sees what
    /// they submitted plus anything raised against their facility.
    pub fn visible_to(&self, actor: &Actor) -> Vec<&StressRequest> {
        newest_first(self.records.values().filter(|record| match actor.role {
            UserRole::Administrator | UserRole::Ops => true,
            UserRole::FacilityHead => {
                record.submitted_by == actor.user_id
                    || actor.assigned_facility_id.as_ref() == Some(&record.facility_id)
            }
        }))
    }

    pub fn in_force(&self, as_of: NaiveDate) -> Vec<&StressRequest> {
        let mut records =
            self.records.values().filter(|record| record.is_in_force(as_of)).collect::<Vec<_>>();
        records.sort_by(|left, right| {
            left.scope_key().cmp(&right.scope_key()).then_with(|| left.start_date.cmp(&right.start_date))
        });
        records
    }
}

fn newest_first<'a>(records: impl Iterator<Item = &'a StressRequest>) -> Vec<&'a StressRequest> {
    let mut records = records.collect::<Vec<_>>();
    records.sort_by_key(|record| (Reverse(record.submitted_at), Reverse(record.id.clone())));
    records
}
