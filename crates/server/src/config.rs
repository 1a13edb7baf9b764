use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use menu::DEFAULT_SHORT_CODE;
use serde::Deserialize;
use storage::MIN_SESSION_TTL;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub backend_url: String,
    pub short_code: String,
    pub session_ttl_seconds: u64,
    pub request_timeout_seconds: u64,
    pub backend_timeout_seconds: u64,
    pub purge_interval_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/ussd.db".into(),
            backend_url: "http://127.0.0.1:3000".into(),
            short_code: DEFAULT_SHORT_CODE.into(),
            session_ttl_seconds: 1800,
            request_timeout_seconds: 15,
            backend_timeout_seconds: 10,
            purge_interval_seconds: 300,
        }
    }
}

/// Environment overrides in precedence order: a later entry for the same
/// setting wins.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_BIND", "bind_addr"),
    ("APP__BIND_ADDR", "bind_addr"),
    ("DATABASE_URL", "database_url"),
    ("APP__DATABASE_URL", "database_url"),
    ("BACKEND_URL", "backend_url"),
    ("APP__BACKEND_URL", "backend_url"),
    ("USSD_SHORTCODE", "shortcode"),
    ("APP__SHORTCODE", "shortcode"),
    ("USSD_SESSION_TTL_SECONDS", "session_ttl_seconds"),
    ("APP__SESSION_TTL_SECONDS", "session_ttl_seconds"),
    ("APP__REQUEST_TIMEOUT_SECONDS", "request_timeout_seconds"),
    ("APP__BACKEND_TIMEOUT_SECONDS", "backend_timeout_seconds"),
    ("APP__PURGE_INTERVAL_SECONDS", "purge_interval_seconds"),
];

impl Settings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds).max(MIN_SESSION_TTL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_seconds.max(1))
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds.max(1))
    }

    fn apply(&mut self, key: &str, value: String) {
        match key {
            "bind_addr" => self.server_bind = value,
            "database_url" => self.database_url = value,
            "backend_url" => self.backend_url = value,
            "shortcode" => self.short_code = value,
            "session_ttl_seconds" => set_seconds(&mut self.session_ttl_seconds, key, &value),
            "request_timeout_seconds" => {
                set_seconds(&mut self.request_timeout_seconds, key, &value)
            }
            "backend_timeout_seconds" => {
                set_seconds(&mut self.backend_timeout_seconds, key, &value)
            }
            "purge_interval_seconds" => set_seconds(&mut self.purge_interval_seconds, key, &value),
            other => debug!(key = other, "ignoring unknown setting"),
        }
    }
}

fn set_seconds(target: &mut u64, key: &str, value: &str) {
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(key, value, "ignoring non-numeric setting"),
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    resolve_settings(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `server.toml` table, then the environment.
fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    match value {
                        toml::Value::String(v) => settings.apply(&key, v),
                        toml::Value::Integer(v) => settings.apply(&key, v.to_string()),
                        _ => warn!(%key, "ignoring non-scalar setting in server.toml"),
                    }
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    for (env_key, key) in ENV_OVERRIDES {
        if let Some(value) = env(env_key) {
            settings.apply(key, value);
        }
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }
    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    let path = if let Some(rest) = raw_database_url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = raw_database_url.strip_prefix("sqlite:") {
        rest
    } else if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    } else {
        raw_database_url
    };

    let path = path.replace('\\', "/");
    // `sqlite://C:/...` would read `C:` as a host.
    if has_drive_letter(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
