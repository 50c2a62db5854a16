use chrono::{NaiveDate, Utc};
use serde_json::json;

use stressless_core::{
    FacilityFunction, FacilityId, StressLevel, StressScope, StressSubmission,
};

use crate::commands::{execute, to_data, CommandResult, GlobalArgs, Session, EXIT_DOMAIN};

#[derive(Debug, Clone, clap::Args)]
pub struct SubmitArgs {
    #[arg(long = "as", value_name = "USER_ID", help = "Directory user submitting the request")]
    pub actor: String,
    #[arg(long, value_name = "FACILITY_ID")]
    pub facility: String,
    #[arg(long, value_parser = parse_function, help = "fm_pickup | lm_delivery | rto_dto | rvp_facility")]
    pub function: FacilityFunction,
    #[arg(long, value_parser = parse_level, default_value = "facility", help = "facility | route | subcluster | pincode")]
    pub level: StressLevel,
    #[arg(long)]
    pub route: Option<String>,
    #[arg(long)]
    pub subcluster: Option<String>,
    #[arg(long)]
    pub pincode: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD", help = "First stressed day; defaults to today (UTC)")]
    pub start: Option<NaiveDate>,
    #[arg(long, value_name = "DAYS")]
    pub days: u32,
    #[arg(long)]
    pub reason: String,
}

pub fn run(globals: &GlobalArgs, args: SubmitArgs) -> CommandResult {
    execute("submit", globals, |config| async move {
        let scope = StressScope::from_parts(
            args.level,
            args.route.as_deref(),
            args.subcluster.as_deref(),
            args.pincode.as_deref(),
        )
        .map_err(|error| ("invalid_scope", error.to_string(), EXIT_DOMAIN))?;

        let session = Session::open(&config).await?;
        let call = session.call(&args.actor)?;
        let submission = StressSubmission {
            facility_id: FacilityId(args.facility.trim().to_owned()),
            facility_function: args.function,
            scope,
            start_date: args.start.unwrap_or_else(|| Utc::now().date_naive()),
            extension_days: args.days,
            reason: args.reason,
        };

        let result = match session.desk.submit(submission, &call).await {
            Ok(transition) => {
                let request = to_data(&transition.request())?;
                CommandResult::success_with_data(
                    "submit",
                    format!("submitted {}", transition.request_id),
                    Some(json!({ "kind": transition.kind, "request": request })),
                )
            }
            Err(error) => CommandResult::rejected("submit", error, &call.correlation_id),
        };
        session.close().await;
        Ok(result)
    })
}

pub(crate) fn parse_function(value: &str) -> Result<FacilityFunction, String> {
    FacilityFunction::parse(value).ok_or_else(|| format!("unknown facility function `{value}`"))
}

pub(crate) fn parse_level(value: &str) -> Result<StressLevel, String> {
    StressLevel::parse(value).ok_or_else(|| format!("unknown stress level `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::{parse_function, parse_level};
    use stressless_core::{FacilityFunction, StressLevel};

    #[test]
    fn cli_values_parse_storage_keys() {
        assert_eq!(parse_function("rvp_facility"), Ok(FacilityFunction::RvpFacility));
        assert_eq!(parse_level("Subcluster"), Ok(StressLevel::Subcluster));
        assert!(parse_function("air_hub").is_err());
    }
}
