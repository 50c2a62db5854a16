use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::commands::{load_config, CommandResult, GlobalArgs};

/// Renders the effective configuration, one line per key with the layer it
/// came from.
pub fn run(globals: &GlobalArgs) -> CommandResult {
    let config = match load_config(globals) {
        Ok(config) => config,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("config", error_class, message, exit_code)
        }
    };

    let config_file_path = detect_config_path(globals.config.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str], flag: Option<&str>, flag_set: bool| {
        field_source(
            key_path,
            env_keys,
            flag.filter(|_| flag_set),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        )
    };

    let directory_path = config
        .directory
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in demo directory>".to_string());

    let lines = [
        "effective config (source precedence: flag > env > file > default):".to_string(),
        render_line(
            "database.url",
            &config.database.url,
            source(
                "database.url",
                &["STRESSLESS_DATABASE_URL"],
                Some("--database-url"),
                globals.database_url.is_some(),
            ),
        ),
        render_line(
            "database.max_connections",
            &config.database.max_connections.to_string(),
            source("database.max_connections", &["STRESSLESS_DATABASE_MAX_CONNECTIONS"], None, false),
        ),
        render_line(
            "database.timeout_secs",
            &config.database.timeout_secs.to_string(),
            source("database.timeout_secs", &["STRESSLESS_DATABASE_TIMEOUT_SECS"], None, false),
        ),
        render_line(
            "engine.max_extension_days",
            &config.engine.max_extension_days.to_string(),
            source("engine.max_extension_days", &["STRESSLESS_ENGINE_MAX_EXTENSION_DAYS"], None, false),
        ),
        render_line(
            "engine.delivery_max_attempts",
            &config.engine.delivery_max_attempts.to_string(),
            source(
                "engine.delivery_max_attempts",
                &["STRESSLESS_ENGINE_DELIVERY_MAX_ATTEMPTS"],
                None,
                false,
            ),
        ),
        render_line(
            "engine.delivery_backoff_ms",
            &config.engine.delivery_backoff_ms.to_string(),
            source("engine.delivery_backoff_ms", &["STRESSLESS_ENGINE_DELIVERY_BACKOFF_MS"], None, false),
        ),
        render_line(
            "directory.path",
            &directory_path,
            source(
                "directory.path",
                &["STRESSLESS_DIRECTORY_PATH"],
                Some("--directory"),
                globals.directory.is_some(),
            ),
        ),
        render_line(
            "logging.level",
            &config.logging.level,
            source(
                "logging.level",
                &["STRESSLESS_LOGGING_LEVEL", "STRESSLESS_LOG_LEVEL"],
                Some("--log-level"),
                globals.log_level.is_some(),
            ),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", &["STRESSLESS_LOGGING_FORMAT", "STRESSLESS_LOG_FORMAT"], None, false),
        ),
    ];

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("stressless.toml"), PathBuf::from("config/stressless.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    flag: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(flag) = flag {
        return format!("flag ({flag})");
    }

    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[engine]\nmax_extension_days = 14\n".parse().expect("toml");
        assert!(contains_path(&doc, "engine.max_extension_days"));
        assert!(!contains_path(&doc, "engine.delivery_backoff_ms"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn explicit_flags_outrank_every_other_source() {
        let doc: Value = "[database]\nurl = \"sqlite://file.db\"\n".parse().expect("toml");
        assert_eq!(
            field_source("database.url", &[], Some("--database-url"), Some(&doc), None),
            "flag (--database-url)"
        );
        assert_eq!(field_source("database.url", &[], None, Some(&doc), None), "file (config file)");
        assert_eq!(field_source("logging.level", &[], None, Some(&doc), None), "default");
    }
}
