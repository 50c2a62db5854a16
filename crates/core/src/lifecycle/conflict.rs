use chrono::NaiveDate;

use crate::domain::request::{RequestStatus, StressRequest};
use crate::errors::EngineError;

/// Finds the approved record that is still in force under the candidate's
/// scope key. At most one may exist; finding more means the store was written
/// around the engine and nothing can be merged safely.
pub fn find_conflict<'a, I>(
    records: I,
    candidate: &StressRequest,
    today: NaiveDate,
) -> Result<Option<&'a StressRequest>, EngineError>
where
    I: IntoIterator<Item = &'a StressRequest>,
{
    let key = candidate.scope_key();
    let matches = records
        .into_iter()
        .filter(|existing| {
            existing.id != candidate.id
                && existing.status == RequestStatus::Approved
                && existing.window().is_active(today)
                && existing.scope_key() == key
        })
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(*single)),
        many => {
            let ids = many.iter().map(|record| record.id.0.as_str()).collect::<Vec<_>>().join(", ");
            tracing::error!(
                event_name = "lifecycle.conflict.invariant_violation",
                request_id = %candidate.id,
                scope_key = %key,
                active_ids = %ids,
                "multiple active approved records share one scope key"
            );
            Err(EngineError::InvariantViolation(format!(
                "{} active approved records share scope `{key}`: {ids}",
                many.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::find_conflict;
    use crate::domain::facility::{FacilityFunction, FacilityId, RouteId};
    use crate::domain::request::{RequestStatus, StressRequest, StressRequestId, StressScope};
    use crate::domain::user::UserId;
    use crate::errors::EngineError;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).expect("date")
    }

    fn record(id: &str, route: &str, start: u32, days: u32, status: RequestStatus) -> StressRequest {
        StressRequest {
            id: StressRequestId(id.to_owned()),
            facility_id: FacilityId("facility-1".to_owned()),
            facility_function: FacilityFunction::FmPickup,
            scope: StressScope::Route(RouteId(route.to_owned())),
            start_date: date(start),
            extension_days: days,
            reason: "Space Stress".to_owned(),
            submitted_by: UserId("user-ops-1".to_owned()),
            submitted_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("ts"),
            status,
            disposition: None,
            merged_into: None,
            trail: Vec::new(),
            version: 1,
        }
    }

    #[test]
    fn finds_the_single_active_approved_record() {
        let existing = record("SR-E", "route-fm-1", 1, 5, RequestStatus::Approved);
        let candidate = record("SR-R", "route-fm-1", 4, 5, RequestStatus::Pending);
        let records = vec![existing.clone(), candidate.clone()];

        let found = find_conflict(&records, &candidate, date(2)).expect("no violation");
        assert_eq!(found.map(|r| &r.id), Some(&existing.id));
    }

    #[test]
    fn ignores_other_routes_non_approved_and_expired_records() {
        let candidate = record("SR-R", "route-fm-1", 10, 5, RequestStatus::Pending);
        let records = vec![
            record("SR-other-route", "route-fm-2", 9, 5, RequestStatus::Approved),
            record("SR-pending", "route-fm-1", 9, 5, RequestStatus::Pending),
            record("SR-rejected", "route-fm-1", 9, 5, RequestStatus::Rejected),
            record("SR-expired", "route-fm-1", 1, 3, RequestStatus::Approved),
            candidate.clone(),
        ];

        assert_eq!(find_conflict(&records, &candidate, date(9)), Ok(None));
    }

    #[test]
    fn active_record_conflicts_even_without_window_overlap() {
        let existing = record("SR-E", "route-fm-1", 1, 5, RequestStatus::Approved);
        let candidate = record("SR-R", "route-fm-1", 20, 2, RequestStatus::Pending);
        let records = vec![existing];

        let found = find_conflict(&records, &candidate, date(3)).expect("no violation");
        assert!(found.is_some());
    }

    #[test]
    fn end_date_today_still_counts_as_active() {
        let existing = record("SR-E", "route-fm-1", 1, 5, RequestStatus::Approved);
        let candidate = record("SR-R", "route-fm-1", 6, 2, RequestStatus::Pending);
        let records = vec![existing];

        assert!(find_conflict(&records, &candidate, date(6)).expect("ok").is_some());
        assert!(find_conflict(&records, &candidate, date(7)).expect("ok").is_none());
    }

    #[test]
    fn duplicate_active_records_are_an_invariant_violation() {
        let candidate = record("SR-R", "route-fm-1", 3, 2, RequestStatus::Pending);
        let records = vec![
            record("SR-A", "route-fm-1", 1, 5, RequestStatus::Approved),
            record("SR-B", "route-fm-1", 2, 5, RequestStatus::Approved),
        ];

        let error = find_conflict(&records, &candidate, date(3)).expect_err("violation");
        assert!(matches!(
            error,
            EngineError::InvariantViolation(ref message)
                if message.contains("SR-A") && message.contains("SR-B")
        ));
    }
}
