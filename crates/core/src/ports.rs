//! Boundary contracts for the collaborators the engine hands its results to.
//! Implementations live in `stressless-db`; the in-memory ones here back tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::request::StressRequest;
use crate::domain::user::UserId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{sink} sink failure: {message}")]
pub struct SinkError {
    pub sink: &'static str,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: &'static str, message: impl Into<String>) -> Self {
        Self { sink, message: message.into() }
    }
}

/// Persistence sink. `persist_request` receives the full record after every
/// committed transition, in commit order.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn load_requests(&self) -> Result<Vec<StressRequest>, SinkError>;
    async fn persist_request(&self, request: &StressRequest) -> Result<(), SinkError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_max_extension_days(&self) -> Result<Option<u32>, SinkError>;
    async fn save_max_extension_days(
        &self,
        days: u32,
        updated_by: &UserId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), SinkError>;
}

#[derive(Clone, Default)]
pub struct InMemoryRequestStore {
    requests: Arc<Mutex<Vec<StressRequest>>>,
}

impl InMemoryRequestStore {
    pub fn snapshot(&self) -> Vec<StressRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn load_requests(&self) -> Result<Vec<StressRequest>, SinkError> {
        Ok(self.snapshot())
    }

    async fn persist_request(&self, request: &StressRequest) -> Result<(), SinkError> {
        let mut requests = match self.requests.lock() {
            Ok(requests) => requests,
            Err(poisoned) => poisoned.into_inner(),
        };
        match requests.iter_mut().find(|existing| existing.id == request.id) {
            Some(existing) if existing.version <= request.version => *existing = request.clone(),
            Some(_) => {}
            None => requests.push(request.clone()),
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySettingsStore {
    max_extension_days: Arc<Mutex<Option<u32>>>,
}

impl InMemorySettingsStore {
    pub fn current(&self) -> Option<u32> {
        match self.max_extension_days.lock() {
            Ok(value) => *value,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load_max_extension_days(&self) -> Result<Option<u32>, SinkError> {
        Ok(self.current())
    }

    async fn save_max_extension_days(
        &self,
        days: u32,
        _updated_by: &UserId,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), SinkError> {
        match self.max_extension_days.lock() {
            Ok(mut value) => *value = Some(days),
            Err(poisoned) => *poisoned.into_inner() = Some(days),
        }
        Ok(())
    }
}
