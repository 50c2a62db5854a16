use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use stressless_core::domain::user::UserId;
use stressless_core::ports::{SettingsStore, SinkError};

use super::{RepositoryError, SettingsRepository};
use crate::DbPool;

pub const MAX_EXTENSION_DAYS_KEY: &str = "max_extension_days";

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM engine_setting WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("value").map_err(RepositoryError::from)).transpose()
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        updated_by: &UserId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO engine_setting (key, value, updated_by, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&updated_by.0)
        .bind(updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqlSettingsRepository {
    async fn load_max_extension_days(&self) -> Result<Option<u32>, SinkError> {
        let stored =
            self.get(MAX_EXTENSION_DAYS_KEY).await.map_err(|error| error.into_sink("settings_store"))?;

        stored
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|error| {
                    SinkError::new(
                        "settings_store",
                        format!("stored `{MAX_EXTENSION_DAYS_KEY}` is not a day count: `{raw}` ({error})"),
                    )
                })
            })
            .transpose()
    }

    async fn save_max_extension_days(
        &self,
        days: u32,
        updated_by: &UserId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), SinkError> {
        self.set(MAX_EXTENSION_DAYS_KEY, &days.to_string(), updated_by, updated_at)
            .await
            .map_err(|error| error.into_sink("settings_store"))
    }
}
