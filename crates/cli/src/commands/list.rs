use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use stressless_core::{Directory, StressRequest};

use crate::commands::{execute, to_data, CommandResult, GlobalArgs, Session, EXIT_DOMAIN};

#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
    #[arg(long = "as", value_name = "USER_ID")]
    pub actor: String,
    #[arg(long, conflicts_with = "in_force", help = "Show the administrator review queue")]
    pub pending: bool,
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        num_args = 0..=1,
        default_missing_value = "today",
        value_parser = parse_as_of,
        help = "Show approved markings in force on a date (default today)"
    )]
    pub in_force: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct RequestRow<'a> {
    id: &'a str,
    facility: &'a str,
    function: &'static str,
    scope: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    extension_days: u32,
    status: &'static str,
    reason: &'a str,
    submitted_by: &'a str,
    merged_into: Option<&'a str>,
    comments: String,
}

impl<'a> RequestRow<'a> {
    fn new(directory: &'a Directory, request: &'a StressRequest) -> Self {
        Self {
            id: &request.id.0,
            facility: directory.facility_name(&request.facility_id),
            function: request.facility_function.as_str(),
            scope: request.scope.to_string(),
            start_date: request.start_date,
            end_date: request.end_date(),
            extension_days: request.extension_days,
            status: request.status.as_str(),
            reason: &request.reason,
            submitted_by: &request.submitted_by.0,
            merged_into: request.merged_into.as_ref().map(|id| id.0.as_str()),
            comments: request.render_comments(),
        }
    }
}

pub fn run(globals: &GlobalArgs, args: ListArgs) -> CommandResult {
    execute("list", globals, |config| async move {
        let session = Session::open(&config).await?;
        let actor = session.actor(&args.actor)?;

        let (view, requests) = if let Some(as_of) = args.in_force {
            (format!("in force on {as_of}"), session.desk.in_force(as_of).await)
        } else if args.pending {
            if !actor.is_administrator() {
                return Err((
                    "forbidden",
                    format!("user `{}` may not view the review queue", actor.user_id),
                    EXIT_DOMAIN,
                ));
            }
            ("pending review".to_string(), session.desk.pending().await)
        } else {
            (format!("visible to {}", actor.user_id), session.desk.visible_to(&actor).await)
        };

        let rows = requests
            .iter()
            .map(|request| RequestRow::new(&session.directory, request))
            .collect::<Vec<_>>();
        let count = rows.len();
        let data = to_data(&rows)?;
        session.close().await;

        Ok(CommandResult::success_with_data(
            "list",
            format!("{count} stress requests {view}"),
            Some(json!({ "requests": data })),
        ))
    })
}

fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    if value.eq_ignore_ascii_case("today") {
        return Ok(Utc::now().date_naive());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| format!("invalid date `{value}`: {error}"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{parse_as_of, RequestRow};
    use stressless_core::domain::request::RequestStatus;
    use stressless_core::Directory;

    #[test]
    fn as_of_accepts_today_and_iso_dates() {
        assert!(parse_as_of("today").is_ok());
        assert_eq!(parse_as_of("2026-02-03"), Ok(NaiveDate::from_ymd_opt(2026, 2, 3).expect("date")));
        assert!(parse_as_of("03/02/2026").is_err());
    }

    #[test]
    fn rows_show_facility_names_and_inclusive_end() {
        let directory = Directory::demo();
        let request = stressless_core::StressRequest {
            id: stressless_core::StressRequestId("SR-1".to_owned()),
            facility_id: stressless_core::FacilityId("facility-2".to_owned()),
            facility_function: stressless_core::FacilityFunction::LmDelivery,
            scope: stressless_core::StressScope::Pincode("411001".to_owned()),
            start_date: NaiveDate::from_ymd_opt(2026, 2, 3).expect("date"),
            extension_days: 4,
            reason: "Heavy Rain".to_owned(),
            submitted_by: stressless_core::UserId("user-fh-lm".to_owned()),
            submitted_at: chrono::Utc::now(),
            status: RequestStatus::Pending,
            disposition: None,
            merged_into: None,
            trail: Vec::new(),
            version: 1,
        };

        let row = RequestRow::new(&directory, &request);
        assert_eq!(row.facility, "PNQ/CHK");
        assert_eq!(row.scope, "pincode:411001");
        assert_eq!(row.end_date, NaiveDate::from_ymd_opt(2026, 2, 7).expect("date"));
    }
}
