//! Lifecycle outcomes rendered into operator notifications.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::domain::facility::{FacilityFunction, FacilityId};
use crate::domain::notification::{Notification, NotificationId};
use crate::domain::request::{RequestStatus, StressRequest, StressRequestId};
use crate::domain::user::UserId;
use crate::ports::SinkError;

pub const APPROVALS_LINK: &str = "/dashboard/admin/approvals";
pub const REQUESTS_LINK: &str = "/dashboard/requests";

/// What happened, addressed to one user. Produced by the lifecycle controller
/// and rendered to text only when handed to a sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationIntent {
    AwaitingReview {
        recipient: UserId,
        request_id: StressRequestId,
        facility_id: FacilityId,
        function: FacilityFunction,
    },
    Decided {
        recipient: UserId,
        request_id: StressRequestId,
        facility_id: FacilityId,
        function: FacilityFunction,
        status: RequestStatus,
    },
    WindowExtended {
        recipient: UserId,
        request_id: StressRequestId,
        facility_id: FacilityId,
        function: FacilityFunction,
        new_end: NaiveDate,
    },
    ApprovedAndMerged {
        recipient: UserId,
        request_id: StressRequestId,
        surviving_id: StressRequestId,
        facility_id: FacilityId,
        function: FacilityFunction,
        new_end: NaiveDate,
    },
}

impl NotificationIntent {
    pub fn awaiting_review(recipient: UserId, request: &StressRequest) -> Self {
        Self::AwaitingReview {
            recipient,
            request_id: request.id.clone(),
            facility_id: request.facility_id.clone(),
            function: request.facility_function,
        }
    }

    pub fn decided(request: &StressRequest) -> Self {
        Self::Decided {
            recipient: request.submitted_by.clone(),
            request_id: request.id.clone(),
            facility_id: request.facility_id.clone(),
            function: request.facility_function,
            status: request.status,
        }
    }

    pub fn recipient(&self) -> &UserId {
        match self {
            Self::AwaitingReview { recipient, .. }
            | Self::Decided { recipient, .. }
            | Self::WindowExtended { recipient, .. }
            | Self::ApprovedAndMerged { recipient, .. } => recipient,
        }
    }

    pub fn request_id(&self) -> &StressRequestId {
        match self {
            Self::AwaitingReview { request_id, .. }
            | Self::Decided { request_id, .. }
            | Self::WindowExtended { request_id, .. }
            | Self::ApprovedAndMerged { request_id, .. } => request_id,
        }
    }

    pub fn render(&self, directory: &Directory, created_at: DateTime<Utc>) -> Notification {
        let (message, link) = match self {
            Self::AwaitingReview { facility_id, function, .. } => (
                format!(
                    "New stress request for {} ({function}) needs approval.",
                    directory.facility_name(facility_id)
                ),
                APPROVALS_LINK,
            ),
            Self::Decided { facility_id, function, status, .. } => (
                format!(
                    "Your stress request for {} ({function}) has been {}.",
                    directory.facility_name(facility_id),
                    decided_label(*status)
                ),
                REQUESTS_LINK,
            ),
            Self::WindowExtended { facility_id, function, new_end, .. } => (
                format!(
                    "The stress period for {} ({function}) has been updated. New end date: {}.",
                    directory.facility_name(facility_id),
                    display_date(*new_end)
                ),
                REQUESTS_LINK,
            ),
            Self::ApprovedAndMerged { facility_id, function, new_end, .. } => (
                format!(
                    "Your stress request for {} ({function}) was approved and merged. Facility stressed until {}.",
                    directory.facility_name(facility_id),
                    display_date(*new_end)
                ),
                REQUESTS_LINK,
            ),
        };

        Notification {
            id: NotificationId::generate(),
            recipient: self.recipient().clone(),
            message,
            related_request_id: Some(self.request_id().clone()),
            link: Some(link.to_owned()),
            created_at,
            is_read: false,
        }
    }
}

fn decided_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Approved => "Approved",
        RequestStatus::Rejected => "Rejected",
        RequestStatus::Merged => "Merged",
        RequestStatus::Pending => "Pending",
    }
}

pub fn display_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn delivered_to(&self, recipient: &UserId) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|notification| &notification.recipient == recipient)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{NotificationIntent, APPROVALS_LINK, REQUESTS_LINK};
    use crate::directory::Directory;
    use crate::domain::facility::{FacilityFunction, FacilityId};
    use crate::domain::request::{RequestStatus, StressRequestId};
    use crate::domain::user::UserId;

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).single().expect("timestamp")
    }

    #[test]
    fn awaiting_review_points_admins_at_the_queue() {
        let intent = NotificationIntent::AwaitingReview {
            recipient: UserId("user-admin-1".to_owned()),
            request_id: StressRequestId("SR-1".to_owned()),
            facility_id: FacilityId("facility-1".to_owned()),
            function: FacilityFunction::FmPickup,
        };

        let notification = intent.render(&Directory::demo(), at());
        assert_eq!(notification.message, "New stress request for PNQ/KHR (FM Pickup) needs approval.");
        assert_eq!(notification.link.as_deref(), Some(APPROVALS_LINK));
        assert_eq!(notification.related_request_id, Some(StressRequestId("SR-1".to_owned())));
        assert!(!notification.is_read);
    }

    #[test]
    fn merge_messages_carry_the_new_end_date() {
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).expect("date");
        let directory = Directory::demo();

        let extended = NotificationIntent::WindowExtended {
            recipient: UserId("user-fh-fm".to_owned()),
            request_id: StressRequestId("SR-E".to_owned()),
            facility_id: FacilityId("facility-1".to_owned()),
            function: FacilityFunction::FmPickup,
            new_end: end,
        }
        .render(&directory, at());
        assert_eq!(
            extended.message,
            "The stress period for PNQ/KHR (FM Pickup) has been updated. New end date: January 9, 2026."
        );

        let merged = NotificationIntent::ApprovedAndMerged {
            recipient: UserId("user-ops-1".to_owned()),
            request_id: StressRequestId("SR-R".to_owned()),
            surviving_id: StressRequestId("SR-E".to_owned()),
            facility_id: FacilityId("facility-1".to_owned()),
            function: FacilityFunction::FmPickup,
            new_end: end,
        }
        .render(&directory, at());
        assert!(merged.message.ends_with("Facility stressed until January 9, 2026."));
        assert_eq!(merged.link.as_deref(), Some(REQUESTS_LINK));
    }

    #[test]
    fn unknown_facility_falls_back_to_its_id() {
        let notification = NotificationIntent::Decided {
            recipient: UserId("user-ops-1".to_owned()),
            request_id: StressRequestId("SR-9".to_owned()),
            facility_id: FacilityId("facility-404".to_owned()),
            function: FacilityFunction::LmDelivery,
            status: RequestStatus::Rejected,
        }
        .render(&Directory::demo(), at());

        assert_eq!(
            notification.message,
            "Your stress request for facility-404 (LM Delivery) has been Rejected."
        );
    }
}
