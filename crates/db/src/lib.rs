pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeed, SeedError, SeedResult, SeededRequest, VerificationResult};
pub use repositories::{
    NotificationRepository, RepositoryError, SettingsRepository, SqlNotificationRepository,
    SqlSettingsRepository, SqlStressRequestRepository, StressRequestRepository,
};
