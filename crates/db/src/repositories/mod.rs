use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stressless_core::domain::notification::{Notification, NotificationId};
use stressless_core::domain::request::{RequestStatus, StressRequest, StressRequestId};
use stressless_core::domain::user::UserId;
use stressless_core::ports::SinkError;

pub mod notification;
pub mod settings;
pub mod stress_request;

pub use notification::SqlNotificationRepository;
pub use settings::{SqlSettingsRepository, MAX_EXTENSION_DAYS_KEY};
pub use stress_request::SqlStressRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub(crate) fn into_sink(self, sink: &'static str) -> SinkError {
        SinkError::new(sink, self.to_string())
    }
}

#[async_trait]
pub trait StressRequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &StressRequestId)
        -> Result<Option<StressRequest>, RepositoryError>;
    async fn list(&self, status: Option<RequestStatus>)
        -> Result<Vec<StressRequest>, RepositoryError>;
    /// Inserts or replaces the row. An update only lands when the incoming
    /// record's version is newer than the stored one; returns whether it did.
    async fn save(&self, request: &StressRequest) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn save(&self, notification: &Notification) -> Result<(), RepositoryError>;
    async fn list_for_recipient(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError>;
    async fn mark_all_read(&self, recipient: &UserId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;
    async fn set(
        &self,
        key: &str,
        value: &str,
        updated_by: &UserId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
