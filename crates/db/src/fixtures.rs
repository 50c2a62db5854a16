//! Demo dataset for local runs and end-to-end checks.
//!
//! The seed drives a [`StressDesk`] backed by the SQL repositories, so every
//! row and notification it leaves behind went through the same lifecycle a
//! live caller would. Dates are relative to `now`; a seed run never submits a
//! start date in the past.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use thiserror::Error;

use stressless_core::audit::TracingAuditSink;
use stressless_core::config::EngineConfig;
use stressless_core::directory::Directory;
use stressless_core::domain::facility::{FacilityFunction, FacilityId, RouteId};
use stressless_core::domain::request::{RequestStatus, StressRequestId, StressScope};
use stressless_core::domain::user::{Actor, UserRole};
use stressless_core::errors::ApplicationError;
use stressless_core::{DeskCall, DeskSinks, StressDesk, StressSubmission};

use crate::connection::DbPool;
use crate::repositories::{
    RepositoryError, SqlNotificationRepository, SqlSettingsRepository,
    SqlStressRequestRepository, StressRequestRepository,
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Desk(#[from] ApplicationError),
    #[error("seed start date overflowed from {0}")]
    DateOverflow(NaiveDate),
    #[error("database already holds {0} stress requests; demo seed needs an empty store")]
    NotEmpty(usize),
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests: Vec<SeededRequest>,
}

#[derive(Debug)]
pub struct SeededRequest {
    pub id: StressRequestId,
    pub status: RequestStatus,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoSeed;

impl DemoSeed {
    /// Wires a desk over the SQL repositories for `pool`.
    pub fn sinks(pool: &DbPool) -> DeskSinks {
        DeskSinks {
            requests: Arc::new(SqlStressRequestRepository::new(pool.clone())),
            settings: Arc::new(SqlSettingsRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool.clone())),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Runs four demo requests through the lifecycle against
    /// [`Directory::demo`]: one approved and then extended by a merge, one
    /// left pending, one rejected.
    pub async fn load(pool: &DbPool, now: DateTime<Utc>) -> Result<SeedResult, SeedError> {
        let existing = SqlStressRequestRepository::new(pool.clone()).list(None).await?.len();
        if existing > 0 {
            return Err(SeedError::NotEmpty(existing));
        }

        let directory = Directory::demo();
        let desk = StressDesk::open(directory, &EngineConfig::default(), Self::sinks(pool)).await?;
        let today = now.date_naive();
        let day = |offset: u64| {
            today.checked_add_days(Days::new(offset)).ok_or(SeedError::DateOverflow(today))
        };

        let ops = DeskCall::new(Actor::new("user-ops-1", UserRole::Ops), now);
        let fm_head =
            DeskCall::new(Actor::new("user-fh-fm", UserRole::FacilityHead).with_facility("facility-1"), now);
        let lm_head =
            DeskCall::new(Actor::new("user-fh-lm", UserRole::FacilityHead).with_facility("facility-2"), now);
        let admin = DeskCall::new(Actor::new("user-admin-1", UserRole::Administrator), now);

        let base = desk
            .submit(
                StressSubmission {
                    facility_id: FacilityId("facility-1".to_owned()),
                    facility_function: FacilityFunction::FmPickup,
                    scope: StressScope::Facility,
                    start_date: today,
                    extension_days: 5,
                    reason: "Space Stress".to_owned(),
                },
                &ops,
            )
            .await?
            .request_id;
        desk.approve(&base, Some("Approved for seller-side peak".to_owned()), &admin).await?;

        let extension = desk
            .submit(
                StressSubmission {
                    facility_id: FacilityId("facility-1".to_owned()),
                    facility_function: FacilityFunction::FmPickup,
                    scope: StressScope::Facility,
                    start_date: day(2)?,
                    extension_days: 7,
                    reason: "Manpower Shortage".to_owned(),
                },
                &fm_head,
            )
            .await?
            .request_id;
        desk.approve(&extension, Some("Extending existing marking".to_owned()), &admin).await?;

        let waiting = desk
            .submit(
                StressSubmission {
                    facility_id: FacilityId("facility-2".to_owned()),
                    facility_function: FacilityFunction::LmDelivery,
                    scope: StressScope::Pincode("411001".to_owned()),
                    start_date: day(1)?,
                    extension_days: 3,
                    reason: "Heavy Rain".to_owned(),
                },
                &lm_head,
            )
            .await?
            .request_id;

        let declined = desk
            .submit(
                StressSubmission {
                    facility_id: FacilityId("facility-3".to_owned()),
                    facility_function: FacilityFunction::RtoDto,
                    scope: StressScope::Route(RouteId("route-rto-1".to_owned())),
                    start_date: day(3)?,
                    extension_days: 4,
                    reason: "Vehicle Breakdown".to_owned(),
                },
                &ops,
            )
            .await?
            .request_id;
        desk.reject(&declined, Some("Route capacity is sufficient".to_owned()), &admin).await?;

        tracing::info!(event_name = "seed.loaded", requests = 4, "demo stress requests seeded");

        Ok(SeedResult {
            requests: vec![
                SeededRequest {
                    id: base,
                    status: RequestStatus::Approved,
                    description: "facility-level FM pickup stress, extended by a merge",
                },
                SeededRequest {
                    id: extension,
                    status: RequestStatus::Merged,
                    description: "overlapping FM pickup request folded into the approved marking",
                },
                SeededRequest {
                    id: waiting,
                    status: RequestStatus::Pending,
                    description: "pincode-level LM delivery stress awaiting review",
                },
                SeededRequest {
                    id: declined,
                    status: RequestStatus::Rejected,
                    description: "route-level RTO stress declined by the administrator",
                },
            ],
        })
    }

    /// Checks that every seeded request is stored with the status the seed
    /// drove it to.
    pub async fn verify(pool: &DbPool, seeded: &SeedResult) -> Result<VerificationResult, SeedError> {
        let repository = SqlStressRequestRepository::new(pool.clone());
        let mut checks = Vec::new();
        for (request, label) in seeded.requests.iter().zip(["approved", "merged", "pending", "rejected"]) {
            let stored = repository.find_by_id(&request.id).await?;
            checks.push((label, stored.is_some_and(|stored| stored.status == request.status)));
        }

        let merged_link = match seeded.requests.as_slice() {
            [survivor, merged, ..] => repository
                .find_by_id(&merged.id)
                .await?
                .and_then(|merged| merged.merged_into)
                .is_some_and(|target| target == survivor.id),
            _ => false,
        };
        checks.push(("merge-link", merged_link));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}
