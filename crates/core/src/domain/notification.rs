use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::StressRequestId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(format!("NTF-{}", Uuid::new_v4().simple()))
    }
}

/// A message addressed to one user about one lifecycle outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub message: String,
    pub related_request_id: Option<StressRequestId>,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}
