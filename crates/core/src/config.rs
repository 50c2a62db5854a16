use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::{validate_max_extension_days, DEFAULT_MAX_EXTENSION_DAYS};

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineConfig {
    /// Seed value for the extension ceiling; a persisted setting wins.
    pub max_extension_days: u32,
    pub delivery_max_attempts: u32,
    pub delivery_backoff_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DirectoryConfig {
    /// TOML file with facilities, routes, subclusters, and users. The
    /// built-in demo dataset is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub max_extension_days: Option<u32>,
    pub directory_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_extension_days: DEFAULT_MAX_EXTENSION_DAYS,
            delivery_max_attempts: 3,
            delivery_backoff_ms: 200,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://stressless.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            engine: EngineConfig::default(),
            directory: DirectoryConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("stressless.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(max_extension_days) = engine.max_extension_days {
                self.engine.max_extension_days = max_extension_days;
            }
            if let Some(delivery_max_attempts) = engine.delivery_max_attempts {
                self.engine.delivery_max_attempts = delivery_max_attempts;
            }
            if let Some(delivery_backoff_ms) = engine.delivery_backoff_ms {
                self.engine.delivery_backoff_ms = delivery_backoff_ms;
            }
        }

        if let Some(directory) = patch.directory {
            if let Some(path) = directory.path {
                self.directory.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STRESSLESS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STRESSLESS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STRESSLESS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STRESSLESS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STRESSLESS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STRESSLESS_ENGINE_MAX_EXTENSION_DAYS") {
            self.engine.max_extension_days =
                parse_u32("STRESSLESS_ENGINE_MAX_EXTENSION_DAYS", &value)?;
        }
        if let Some(value) = read_env("STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS") {
            self.engine.delivery_max_attempts =
                parse_u32("STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("STRESSLESS_ENGINE_DELIVERY_BACKOFF_MS") {
            self.engine.delivery_backoff_ms =
                parse_u64("STRESSLESS_ENGINE_DELIVERY_BACKOFF_MS", &value)?;
        }

        if let Some(value) = read_env("STRESSLESS_DIRECTORY_PATH") {
            self.directory.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("STRESSLESS_LOGGING_LEVEL").or_else(|| read_env("STRESSLESS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STRESSLESS_LOGGING_FORMAT").or_else(|| read_env("STRESSLESS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(max_extension_days) = overrides.max_extension_days {
            self.engine.max_extension_days = max_extension_days;
        }
        if let Some(directory_path) = overrides.directory_path {
            self.directory.path = Some(directory_path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_engine(&self.engine)?;
        validate_directory(&self.directory)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("stressless.toml"), PathBuf::from("config/stressless.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    validate_max_extension_days(engine.max_extension_days).map_err(|_| {
        ConfigError::Validation(format!(
            "engine.max_extension_days must be in range 1..=365, got {}",
            engine.max_extension_days
        ))
    })?;

    if engine.delivery_max_attempts == 0 || engine.delivery_max_attempts > 10 {
        return Err(ConfigError::Validation(
            "engine.delivery_max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if engine.delivery_backoff_ms > 60_000 {
        return Err(ConfigError::Validation(
            "engine.delivery_backoff_ms must not exceed 60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_directory(directory: &DirectoryConfig) -> Result<(), ConfigError> {
    if let Some(path) = &directory.path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "directory.path `{}` does not exist; unset it to use the built-in demo directory",
                path.display()
            )));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    engine: Option<EnginePatch>,
    directory: Option<DirectoryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    max_extension_days: Option<u32>,
    delivery_max_attempts: Option<u32>,
    delivery_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat,
        DEFAULT_MAX_EXTENSION_DAYS,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn engine_defaults_match_the_application_defaults() -> Result<(), String> {
        let engine = EngineConfig::default();
        let app = AppConfig::default();

        ensure(engine.max_extension_days == DEFAULT_MAX_EXTENSION_DAYS, "default ceiling")?;
        ensure(app.engine.max_extension_days == engine.max_extension_days, "app ceiling")?;
        ensure(app.engine.delivery_max_attempts == engine.delivery_max_attempts, "attempts")?;
        ensure(app.engine.delivery_backoff_ms == engine.delivery_backoff_ms, "backoff")
    }

    #[test]
    fn defaults_load_without_a_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.engine.max_extension_days == 30, "default ceiling should be 30 days")?;
        ensure(config.engine.delivery_max_attempts == 3, "default attempts should be 3")?;
        ensure(config.directory.path.is_none(), "demo directory should be the default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("TEST_STRESSLESS_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stressless.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_STRESSLESS_DB}"

[engine]
max_extension_days = 45
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.engine.max_extension_days == 45, "file ceiling should apply")?;
            Ok(())
        })();

        clear_vars(&["TEST_STRESSLESS_DB"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("STRESSLESS_LOG_LEVEL", "warn");
        env::set_var("STRESSLESS_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["STRESSLESS_LOG_LEVEL", "STRESSLESS_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("STRESSLESS_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("STRESSLESS_ENGINE_MAX_EXTENSION_DAYS", "60");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stressless.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[engine]
max_extension_days = 20
delivery_backoff_ms = 50

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.engine.max_extension_days == 60, "env ceiling should win over file")?;
            ensure(config.engine.delivery_backoff_ms == 50, "file backoff should win over default")?;
            Ok(())
        })();

        clear_vars(&["STRESSLESS_DATABASE_URL", "STRESSLESS_ENGINE_MAX_EXTENSION_DAYS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("STRESSLESS_ENGINE_MAX_EXTENSION_DAYS", "400");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };

            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("engine.max_extension_days")
            );
            ensure(has_message, "validation failure should mention engine.max_extension_days")
        })();

        clear_vars(&["STRESSLESS_ENGINE_MAX_EXTENSION_DAYS"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS",
                "error should name the offending variable",
            ),
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override".to_string()),
        };

        clear_vars(&["STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS"]);
        result
    }

    #[test]
    fn missing_directory_file_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                directory_path: Some("/nonexistent/stressless-directory.toml".into()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected directory validation failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("directory.path")),
            "validation failure should mention directory.path",
        )
    }
}
