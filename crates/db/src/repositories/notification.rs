use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use stressless_core::domain::notification::{Notification, NotificationId};
use stressless_core::domain::request::StressRequestId;
use stressless_core::domain::user::UserId;
use stressless_core::notify::NotificationSink;
use stressless_core::ports::SinkError;

use super::{parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn save(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notification (
                id,
                recipient_id,
                message,
                related_request_id,
                link,
                created_at,
                is_read
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                message = excluded.message,
                link = excluded.link,
                is_read = excluded.is_read",
        )
        .bind(&notification.id.0)
        .bind(&notification.recipient.0)
        .bind(&notification.message)
        .bind(notification.related_request_id.as_ref().map(|id| id.0.as_str()))
        .bind(notification.link.as_deref())
        .bind(notification.created_at.to_rfc3339())
        .bind(notification.is_read)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_recipient(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, recipient_id, message, related_request_id, link, created_at, is_read
             FROM notification
             WHERE recipient_id = ? AND (? = 0 OR is_read = 0)
             ORDER BY created_at DESC, id ASC",
        )
        .bind(&recipient.0)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(notification_from_row).collect()
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient: &UserId) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("UPDATE notification SET is_read = 1 WHERE recipient_id = ? AND is_read = 0")
                .bind(&recipient.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationSink for SqlNotificationRepository {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        self.save(notification).await.map_err(|error| error.into_sink("notification_sink"))
    }
}

fn notification_from_row(row: SqliteRow) -> Result<Notification, RepositoryError> {
    let related: Option<String> = row.try_get("related_request_id")?;
    Ok(Notification {
        id: NotificationId(row.try_get("id")?),
        recipient: UserId(row.try_get("recipient_id")?),
        message: row.try_get("message")?,
        related_request_id: related.map(StressRequestId),
        link: row.try_get("link")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        is_read: row.try_get("is_read")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use stressless_core::domain::notification::{Notification, NotificationId};
    use stressless_core::domain::request::StressRequestId;
    use stressless_core::domain::user::UserId;
    use stressless_core::notify::{NotificationSink, APPROVALS_LINK};

    use super::SqlNotificationRepository;
    use crate::repositories::NotificationRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlNotificationRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlNotificationRepository::new(pool)
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid timestamp").with_timezone(&Utc)
    }

    fn notification(id: &str, recipient: &str, created_at: &str) -> Notification {
        Notification {
            id: NotificationId(id.to_owned()),
            recipient: UserId(recipient.to_owned()),
            message: format!("message {id}"),
            related_request_id: Some(StressRequestId("SR-1".to_owned())),
            link: Some(APPROVALS_LINK.to_owned()),
            created_at: parse_ts(created_at),
            is_read: false,
        }
    }

    #[tokio::test]
    async fn delivered_notifications_list_newest_first_per_recipient() {
        let repo = setup().await;
        repo.deliver(&notification("NTF-1", "user-admin-1", "2026-03-01T08:00:00Z"))
            .await
            .expect("deliver first");
        repo.deliver(&notification("NTF-2", "user-admin-1", "2026-03-02T08:00:00Z"))
            .await
            .expect("deliver second");
        repo.deliver(&notification("NTF-3", "user-ops-1", "2026-03-02T09:00:00Z"))
            .await
            .expect("deliver other");

        let listed = repo
            .list_for_recipient(&UserId("user-admin-1".to_owned()), false)
            .await
            .expect("list");

        let ids: Vec<&str> = listed.iter().map(|n| n.id.0.as_str()).collect();
        assert_eq!(ids, vec!["NTF-2", "NTF-1"]);
        assert_eq!(listed[0], notification("NTF-2", "user-admin-1", "2026-03-02T08:00:00Z"));
    }

    #[tokio::test]
    async fn mark_read_hides_from_unread_listing() {
        let repo = setup().await;
        let admin = UserId("user-admin-1".to_owned());
        repo.save(&notification("NTF-1", "user-admin-1", "2026-03-01T08:00:00Z")).await.expect("save");
        repo.save(&notification("NTF-2", "user-admin-1", "2026-03-02T08:00:00Z")).await.expect("save");

        assert!(repo.mark_read(&NotificationId("NTF-1".to_owned())).await.expect("mark"));
        assert!(!repo.mark_read(&NotificationId("NTF-1".to_owned())).await.expect("mark again"));

        let unread = repo.list_for_recipient(&admin, true).await.expect("unread");
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id.0, "NTF-2");

        assert_eq!(repo.mark_all_read(&admin).await.expect("mark all"), 1);
        assert!(repo.list_for_recipient(&admin, true).await.expect("unread").is_empty());
        assert_eq!(repo.list_for_recipient(&admin, false).await.expect("all").len(), 2);
    }
}
