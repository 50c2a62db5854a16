//! Single-writer service around [`StressEngine`].
//!
//! Every transition runs under one async mutex. The engine commits in memory,
//! then the changed records go to the request store before the lock is
//! released, so the store observes transitions in commit order.
//! Notifications are delivered after the lock is dropped. Store and
//! notification failures are retried with a fixed backoff and logged; they
//! never undo or fail the transition that produced them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::config::EngineConfig;
use crate::directory::Directory;
use crate::domain::notification::Notification;
use crate::domain::request::{StressRequest, StressRequestId};
use crate::domain::user::Actor;
use crate::errors::{ApplicationError, EngineError};
use crate::lifecycle::{StressEngine, StressSubmission, Transition, TransitionKind};
use crate::notify::NotificationSink;
use crate::ports::{RequestStore, SettingsStore, SinkError};
use crate::settings::{authorize_max_extension_change, validate_max_extension_days};

#[derive(Clone)]
pub struct DeskSinks {
    pub requests: Arc<dyn RequestStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl DeliveryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(engine.delivery_max_attempts, Duration::from_millis(engine.delivery_backoff_ms))
    }
}

/// Who is calling, when, and under which correlation id.
#[derive(Clone, Debug)]
pub struct DeskCall {
    pub actor: Actor,
    pub now: DateTime<Utc>,
    pub correlation_id: String,
}

impl DeskCall {
    pub fn new(actor: Actor, now: DateTime<Utc>) -> Self {
        Self { actor, now, correlation_id: format!("req-{}", Uuid::new_v4().simple()) }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    fn audit(&self, request_id: Option<&StressRequestId>) -> AuditContext {
        AuditContext::new(request_id.cloned(), self.correlation_id.clone(), self.actor.user_id.0.clone())
    }
}

struct DeskState {
    engine: StressEngine,
    max_extension_days: u32,
}

pub struct StressDesk {
    state: Mutex<DeskState>,
    sinks: DeskSinks,
    policy: DeliveryPolicy,
}

impl StressDesk {
    /// Loads stored requests and the persisted extension ceiling. A missing or
    /// out-of-range stored ceiling falls back to `engine.max_extension_days`.
    pub async fn open(
        directory: Directory,
        engine: &EngineConfig,
        sinks: DeskSinks,
    ) -> Result<Self, ApplicationError> {
        let records = sinks
            .requests
            .load_requests()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let stored = sinks
            .settings
            .load_max_extension_days()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let max_extension_days = match stored.map(validate_max_extension_days) {
            Some(Ok(days)) => days,
            Some(Err(error)) => {
                tracing::warn!(
                    event_name = "desk.settings.invalid_stored_value",
                    error = %error,
                    fallback = engine.max_extension_days,
                    "ignoring stored max extension days"
                );
                engine.max_extension_days
            }
            None => engine.max_extension_days,
        };

        tracing::info!(
            event_name = "desk.opened",
            records = records.len(),
            max_extension_days,
            "stress desk ready"
        );

        Ok(Self {
            state: Mutex::new(DeskState {
                engine: StressEngine::from_records(directory, records),
                max_extension_days,
            }),
            sinks,
            policy: DeliveryPolicy::from_config(engine),
        })
    }

    pub async fn submit(
        &self,
        submission: StressSubmission,
        call: &DeskCall,
    ) -> Result<Transition, ApplicationError> {
        let (transition, notifications) = {
            let mut state = self.state.lock().await;
            let max_extension_days = state.max_extension_days;
            let result = state.engine.submit(submission, &call.actor, max_extension_days, call.now);
            self.commit(&state, call, None, "submit", result).await?
        };
        self.deliver(&notifications, call).await;
        Ok(transition)
    }

    pub async fn approve(
        &self,
        id: &StressRequestId,
        comments: Option<String>,
        call: &DeskCall,
    ) -> Result<Transition, ApplicationError> {
        let (transition, notifications) = {
            let mut state = self.state.lock().await;
            let result = state.engine.approve(id, &call.actor, comments, call.now);
            self.commit(&state, call, Some(id), "approve", result).await?
        };
        self.deliver(&notifications, call).await;
        Ok(transition)
    }

    pub async fn reject(
        &self,
        id: &StressRequestId,
        comments: Option<String>,
        call: &DeskCall,
    ) -> Result<Transition, ApplicationError> {
        let (transition, notifications) = {
            let mut state = self.state.lock().await;
            let result = state.engine.reject(id, &call.actor, comments, call.now);
            self.commit(&state, call, Some(id), "reject", result).await?
        };
        self.deliver(&notifications, call).await;
        Ok(transition)
    }

    pub async fn set_max_extension_days(
        &self,
        days: u32,
        call: &DeskCall,
    ) -> Result<u32, ApplicationError> {
        let mut state = self.state.lock().await;
        let audit = call.audit(None);

        let days = match authorize_max_extension_change(&call.actor, days) {
            Ok(days) => days,
            Err(error) => {
                self.sinks.audit.emit(
                    audit
                        .event("settings.max_extension_days_rejected", AuditCategory::Settings, AuditOutcome::Rejected)
                        .with_metadata("requested", days.to_string())
                        .with_metadata("error_class", error.class()),
                );
                return Err(error.into());
            }
        };

        let previous = state.max_extension_days;
        state.max_extension_days = days;
        self.sinks.audit.emit(
            audit
                .event("settings.max_extension_days_updated", AuditCategory::Settings, AuditOutcome::Success)
                .with_metadata("previous", previous.to_string())
                .with_metadata("current", days.to_string()),
        );
        tracing::info!(
            event_name = "desk.settings.max_extension_days_updated",
            correlation_id = %call.correlation_id,
            actor = %call.actor.user_id,
            previous,
            current = days,
            "max extension days updated"
        );

        let settings = &self.sinks.settings;
        let (actor, at) = (&call.actor.user_id, call.now);
        self.with_retries(call, None, "settings_store", move || {
            settings.save_max_extension_days(days, actor, at)
        })
        .await;

        Ok(days)
    }

    pub async fn max_extension_days(&self) -> u32 {
        self.state.lock().await.max_extension_days
    }

    pub async fn get(&self, id: &StressRequestId) -> Option<StressRequest> {
        self.state.lock().await.engine.get(id).cloned()
    }

    pub async fn pending(&self) -> Vec<StressRequest> {
        self.state.lock().await.engine.pending().into_iter().cloned().collect()
    }

    pub async fn visible_to(&self, actor: &Actor) -> Vec<StressRequest> {
        self.state.lock().await.engine.visible_to(actor).into_iter().cloned().collect()
    }

    pub async fn in_force(&self, as_of: NaiveDate) -> Vec<StressRequest> {
        self.state.lock().await.engine.in_force(as_of).into_iter().cloned().collect()
    }

    /// Audits the engine result and, on success, persists the changed records
    /// while the caller still holds the state lock.
    async fn commit(
        &self,
        state: &DeskState,
        call: &DeskCall,
        request_id: Option<&StressRequestId>,
        action: &'static str,
        result: Result<Transition, EngineError>,
    ) -> Result<(Transition, Vec<Notification>), ApplicationError> {
        let transition = match result {
            Ok(transition) => transition,
            Err(error) => {
                let outcome = match &error {
                    EngineError::InvariantViolation(_) => AuditOutcome::Failed,
                    _ => AuditOutcome::Rejected,
                };
                self.sinks.audit.emit(
                    call.audit(request_id)
                        .event(format!("lifecycle.{action}_rejected"), category_for(action), outcome)
                        .with_metadata("error_class", error.class())
                        .with_metadata("error", error.to_string()),
                );
                tracing::warn!(
                    event_name = "desk.transition.rejected",
                    correlation_id = %call.correlation_id,
                    actor = %call.actor.user_id,
                    action,
                    error_class = error.class(),
                    error = %error,
                    "transition rejected"
                );
                return Err(error.into());
            }
        };

        let category = match transition.kind {
            TransitionKind::Merged { .. } => AuditCategory::Merge,
            _ => category_for(action),
        };
        let changed =
            transition.changed.iter().map(|record| record.id.0.as_str()).collect::<Vec<_>>().join(",");
        self.sinks.audit.emit(
            call.audit(Some(&transition.request_id))
                .event(format!("lifecycle.request_{}", transition.kind.as_str()), category, AuditOutcome::Success)
                .with_metadata("changed", changed),
        );
        tracing::info!(
            event_name = "desk.transition.committed",
            correlation_id = %call.correlation_id,
            request_id = %transition.request_id,
            actor = %call.actor.user_id,
            kind = transition.kind.as_str(),
            "transition committed"
        );

        let requests = &self.sinks.requests;
        for record in &transition.changed {
            self.with_retries(call, Some(&record.id), "request_store", move || {
                requests.persist_request(record)
            })
            .await;
        }

        let notifications = transition
            .notifications
            .iter()
            .map(|intent| intent.render(state.engine.directory(), call.now))
            .collect();
        Ok((transition, notifications))
    }

    async fn deliver(&self, notifications: &[Notification], call: &DeskCall) {
        let sink = &self.sinks.notifications;
        for notification in notifications {
            self.with_retries(call, notification.related_request_id.as_ref(), "notification_sink", move || {
                sink.deliver(notification)
            })
            .await;
        }
    }

    async fn with_retries<F, Fut>(
        &self,
        call: &DeskCall,
        request_id: Option<&StressRequestId>,
        sink: &'static str,
        mut attempt: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), SinkError>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;
        for attempt_number in 1..=max_attempts {
            match attempt().await {
                Ok(()) => return true,
                Err(error) => {
                    tracing::warn!(
                        event_name = "desk.delivery.retry",
                        correlation_id = %call.correlation_id,
                        sink,
                        attempt = attempt_number,
                        max_attempts,
                        error = %error,
                        "sink call failed"
                    );
                    last_error = Some(error);
                    if attempt_number < max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        let error = last_error.map(|error| error.to_string()).unwrap_or_default();
        tracing::error!(
            event_name = "desk.delivery.exhausted",
            correlation_id = %call.correlation_id,
            sink,
            max_attempts,
            error = %error,
            "giving up on sink call; transition stays committed"
        );
        self.sinks.audit.emit(
            call.audit(request_id)
                .event("desk.delivery_failed", AuditCategory::Delivery, AuditOutcome::Failed)
                .with_metadata("sink", sink)
                .with_metadata("error", error),
        );
        false
    }
}

fn category_for(action: &str) -> AuditCategory {
    match action {
        "submit" => AuditCategory::Submission,
        _ => AuditCategory::Decision,
    }
}
