use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use stressless_core::domain::facility::{FacilityFunction, FacilityId, StressLevel};
use stressless_core::domain::request::{
    Disposition, RequestStatus, StressRequest, StressRequestId, StressScope, TrailEntry,
};
use stressless_core::domain::user::UserId;
use stressless_core::ports::{RequestStore, SinkError};

use super::{
    parse_optional_timestamp, parse_timestamp, parse_u32, RepositoryError,
    StressRequestRepository,
};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "SELECT
        id,
        facility_id,
        facility_function,
        stress_level,
        route_id,
        subcluster_id,
        pincode,
        start_date,
        extension_days,
        reason,
        submitted_by,
        submitted_at,
        status,
        admin_approver_id,
        admin_comments,
        approval_date,
        merged_into,
        trail_json,
        version
     FROM stress_request";

pub struct SqlStressRequestRepository {
    pool: DbPool,
}

impl SqlStressRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StressRequestRepository for SqlStressRequestRepository {
    async fn find_by_id(
        &self,
        id: &StressRequestId,
    ) -> Result<Option<StressRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(request_from_row).transpose()
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<StressRequest>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "{SELECT_COLUMNS} WHERE status = ? ORDER BY submitted_at DESC, id ASC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY submitted_at DESC, id ASC"))
                .fetch_all(&self.pool)
                .await?
        };

        rows.into_iter().map(request_from_row).collect()
    }

    async fn save(&self, request: &StressRequest) -> Result<bool, RepositoryError> {
        let trail_json = serde_json::to_string(&request.trail).map_err(|error| {
            RepositoryError::Decode(format!("cannot encode trail for {}: {error}", request.id))
        })?;
        let disposition = request.disposition.as_ref();

        let result = sqlx::query(
            "INSERT INTO stress_request (
                id,
                facility_id,
                facility_function,
                stress_level,
                route_id,
                subcluster_id,
                pincode,
                start_date,
                extension_days,
                end_date,
                reason,
                submitted_by,
                submitted_at,
                status,
                admin_approver_id,
                admin_comments,
                approval_date,
                merged_into,
                trail_json,
                version
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                start_date = excluded.start_date,
                extension_days = excluded.extension_days,
                end_date = excluded.end_date,
                status = excluded.status,
                admin_approver_id = excluded.admin_approver_id,
                admin_comments = excluded.admin_comments,
                approval_date = excluded.approval_date,
                merged_into = excluded.merged_into,
                trail_json = excluded.trail_json,
                version = excluded.version
             WHERE excluded.version >= stress_request.version",
        )
        .bind(&request.id.0)
        .bind(&request.facility_id.0)
        .bind(request.facility_function.as_str())
        .bind(request.stress_level().as_str())
        .bind(route_column(&request.scope))
        .bind(subcluster_column(&request.scope))
        .bind(pincode_column(&request.scope))
        .bind(request.start_date.format(DATE_FORMAT).to_string())
        .bind(i64::from(request.extension_days))
        .bind(request.end_date().format(DATE_FORMAT).to_string())
        .bind(&request.reason)
        .bind(&request.submitted_by.0)
        .bind(request.submitted_at.to_rfc3339())
        .bind(request.status.as_str())
        .bind(disposition.map(|disposition| disposition.admin_approver_id.0.as_str()))
        .bind(disposition.and_then(|disposition| disposition.admin_comments.as_deref()))
        .bind(disposition.map(|disposition| disposition.approval_date.to_rfc3339()))
        .bind(request.merged_into.as_ref().map(|target| target.0.as_str()))
        .bind(trail_json)
        .bind(i64::from(request.version))
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::debug!(
                request_id = %request.id,
                version = request.version,
                "skipped stale stress request write"
            );
        }
        Ok(applied)
    }
}

#[async_trait]
impl RequestStore for SqlStressRequestRepository {
    async fn load_requests(&self) -> Result<Vec<StressRequest>, SinkError> {
        self.list(None).await.map_err(|error| error.into_sink("request_store"))
    }

    async fn persist_request(&self, request: &StressRequest) -> Result<(), SinkError> {
        self.save(request).await.map(|_| ()).map_err(|error| error.into_sink("request_store"))
    }
}

fn route_column(scope: &StressScope) -> Option<&str> {
    match scope {
        StressScope::Route(route_id) => Some(&route_id.0),
        _ => None,
    }
}

fn subcluster_column(scope: &StressScope) -> Option<&str> {
    match scope {
        StressScope::Subcluster(subcluster_id) => Some(&subcluster_id.0),
        _ => None,
    }
}

fn pincode_column(scope: &StressScope) -> Option<&str> {
    match scope {
        StressScope::Pincode(pincode) => Some(pincode),
        _ => None,
    }
}

fn request_from_row(row: SqliteRow) -> Result<StressRequest, RepositoryError> {
    let id = StressRequestId(row.try_get("id")?);

    let function_raw: String = row.try_get("facility_function")?;
    let facility_function = FacilityFunction::parse(&function_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown facility_function `{function_raw}` on {id}"))
    })?;

    let level_raw: String = row.try_get("stress_level")?;
    let level = StressLevel::parse(&level_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown stress_level `{level_raw}` on {id}"))
    })?;
    let route_id: Option<String> = row.try_get("route_id")?;
    let subcluster_id: Option<String> = row.try_get("subcluster_id")?;
    let pincode: Option<String> = row.try_get("pincode")?;
    let scope = StressScope::from_parts(
        level,
        route_id.as_deref(),
        subcluster_id.as_deref(),
        pincode.as_deref(),
    )
    .map_err(|error| RepositoryError::Decode(format!("invalid scope on {id}: {error}")))?;

    let status_raw: String = row.try_get("status")?;
    let status = RequestStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_raw}` on {id}")))?;

    let approver: Option<String> = row.try_get("admin_approver_id")?;
    let approval_date = parse_optional_timestamp("approval_date", row.try_get("approval_date")?)?;
    let admin_comments: Option<String> = row.try_get("admin_comments")?;
    let disposition = match (approver, approval_date) {
        (Some(approver), Some(approval_date)) => Some(Disposition {
            admin_approver_id: UserId(approver),
            admin_comments,
            approval_date,
        }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(format!(
                "partial disposition on {id}: approver and approval_date must be set together"
            )))
        }
    };

    let trail_raw: String = row.try_get("trail_json")?;
    let trail: Vec<TrailEntry> = serde_json::from_str(&trail_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid trail_json on {id}: {error}")))?;

    let merged_into: Option<String> = row.try_get("merged_into")?;

    Ok(StressRequest {
        facility_id: FacilityId(row.try_get("facility_id")?),
        facility_function,
        scope,
        start_date: parse_date("start_date", row.try_get("start_date")?)?,
        extension_days: parse_u32("extension_days", row.try_get("extension_days")?)?,
        reason: row.try_get("reason")?,
        submitted_by: UserId(row.try_get("submitted_by")?),
        submitted_at: parse_timestamp("submitted_at", row.try_get("submitted_at")?)?,
        status,
        disposition,
        merged_into: merged_into.map(StressRequestId),
        trail,
        version: parse_u32("version", row.try_get("version")?)?,
        id,
    })
}

fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}
