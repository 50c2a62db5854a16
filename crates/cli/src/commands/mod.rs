pub mod config;
pub mod decide;
pub mod list;
pub mod migrate;
pub mod notifications;
pub mod seed;
pub mod settings;
pub mod submit;

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use stressless_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use stressless_core::{Actor, ApplicationError, DeskCall, Directory, StressDesk, UserId};
use stressless_db::{connect_with_config, migrations, DbPool, DemoSeed};

pub const EXIT_DOMAIN: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DB_CONNECT: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_SEED_VERIFICATION: u8 = 6;

/// Error triple carried out of `block_on`: class, message, exit code.
pub type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Reports a desk rejection with the interface class and correlation id.
    pub fn rejected(command: &str, error: ApplicationError, correlation_id: &str) -> Self {
        let interface = error.into_interface(correlation_id);
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(interface.error_class().to_string()),
            message: format!("{} ({})", interface.user_message(), interface.message()),
            correlation_id: Some(correlation_id.to_string()),
            data: None,
        };
        Self { exit_code: EXIT_DOMAIN, output: serialize_payload(payload) }
    }

    pub fn from_outcome(command: &str, outcome: Result<CommandResult, Failure>) -> Self {
        match outcome {
            Ok(result) => result,
            Err((error_class, message, exit_code)) => {
                Self::failure(command, error_class, message, exit_code)
            }
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Flags accepted by every subcommand.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a stressless.toml config file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the database URL")]
    pub database_url: Option<String>,
    #[arg(long, global = true, help = "Override the facility directory TOML file")]
    pub directory: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the log level")]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                max_extension_days: None,
                directory_path: self.directory.clone(),
            },
        }
    }
}

pub fn load_config(globals: &GlobalArgs) -> Result<AppConfig, Failure> {
    AppConfig::load(globals.load_options())
        .map_err(|error| ("config_validation", format!("configuration issue: {error}"), EXIT_CONFIG))
}

pub fn build_runtime() -> Result<tokio::runtime::Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        ("runtime_init", format!("failed to initialize async runtime: {error}"), EXIT_RUNTIME)
    })
}

/// Runs `body` on a fresh current-thread runtime after loading config.
pub fn execute<F, Fut>(command: &str, globals: &GlobalArgs, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: std::future::Future<Output = Result<CommandResult, Failure>>,
{
    let outcome = load_config(globals)
        .and_then(|config| build_runtime().map(|runtime| (config, runtime)))
        .and_then(|(config, runtime)| runtime.block_on(body(config)));
    CommandResult::from_outcome(command, outcome)
}

pub fn load_directory(config: &AppConfig) -> Result<Directory, Failure> {
    match &config.directory.path {
        Some(path) => Directory::load(path)
            .map_err(|error| ("directory_load", error.to_string(), EXIT_CONFIG)),
        None => Ok(Directory::demo()),
    }
}

pub async fn open_pool(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECT))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
    Ok(pool)
}

/// A migrated pool plus a desk hydrated from it.
pub struct Session {
    pub pool: DbPool,
    pub desk: StressDesk,
    pub directory: Directory,
}

impl Session {
    pub async fn open(config: &AppConfig) -> Result<Self, Failure> {
        let directory = load_directory(config)?;
        let pool = open_pool(config).await?;
        let desk = StressDesk::open(directory.clone(), &config.engine, DemoSeed::sinks(&pool))
            .await
            .map_err(|error| ("desk_open", error.to_string(), EXIT_RUNTIME))?;
        Ok(Self { pool, desk, directory })
    }

    pub fn actor(&self, user_id: &str) -> Result<Actor, Failure> {
        self.directory
            .user(&UserId(user_id.trim().to_owned()))
            .map(Actor::from)
            .ok_or_else(|| ("unknown_actor", format!("user `{user_id}` is not in the directory"), EXIT_DOMAIN))
    }

    pub fn call(&self, user_id: &str) -> Result<DeskCall, Failure> {
        self.actor(user_id).map(|actor| DeskCall::new(actor, Utc::now()))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

pub fn to_data<T: Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value)
        .map_err(|error| ("serialization", error.to_string(), EXIT_RUNTIME))
}
