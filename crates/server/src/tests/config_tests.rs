use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key: &str| {
        pairs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = resolve_settings(None, no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.short_code, "*384#");
    assert_eq!(settings.session_ttl(), Duration::from_secs(1800));
}

#[test]
fn file_values_override_defaults() {
    let file = r#"
        bind_addr = "0.0.0.0:9000"
        backend_url = "https://backend.example/api"
        shortcode = "*123#"
        session_ttl_seconds = 600
        purge_interval_seconds = "30"
    "#;
    let settings = resolve_settings(Some(file), no_env);
    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.backend_url, "https://backend.example/api");
    assert_eq!(settings.short_code, "*123#");
    assert_eq!(settings.session_ttl_seconds, 600);
    assert_eq!(settings.purge_interval_seconds, 30);
}

#[test]
fn prefixed_env_beats_legacy_env_and_file() {
    let file = r#"database_url = "sqlite://./from-file.db""#;
    let settings = resolve_settings(
        Some(file),
        env_of(&[
            ("DATABASE_URL", "sqlite://./legacy.db"),
            ("APP__DATABASE_URL", "sqlite://./prefixed.db"),
            ("USSD_SHORTCODE", "*555#"),
        ]),
    );
    assert_eq!(settings.database_url, "sqlite://./prefixed.db");
    assert_eq!(settings.short_code, "*555#");
}

#[test]
fn unparsable_inputs_are_ignored() {
    let settings = resolve_settings(
        Some("this is not toml ="),
        env_of(&[("APP__SESSION_TTL_SECONDS", "soon")]),
    );
    assert_eq!(settings, Settings::default());
}

#[test]
fn session_ttl_is_never_below_a_minute() {
    let settings = resolve_settings(None, env_of(&[("USSD_SESSION_TTL_SECONDS", "5")]));
    assert_eq!(settings.session_ttl_seconds, 5);
    assert_eq!(settings.session_ttl(), Duration::from_secs(60));
}

#[test]
fn zero_timeouts_are_raised_to_one_second() {
    let settings = resolve_settings(
        None,
        env_of(&[
            ("APP__REQUEST_TIMEOUT_SECONDS", "0"),
            ("APP__BACKEND_TIMEOUT_SECONDS", "0"),
            ("APP__PURGE_INTERVAL_SECONDS", "0"),
        ]),
    );
    assert_eq!(settings.request_timeout(), Duration::from_secs(1));
    assert_eq!(settings.backend_timeout(), Duration::from_secs(1));
    assert_eq!(settings.purge_interval(), Duration::from_secs(1));
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn creates_parent_dir_for_sqlite_path() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("ussd_server_test_{suffix}"));
    let db_path = temp_root.join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.join("data").exists());

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("ussd_server_open_test_{suffix}"));
    let db_path = temp_root.join("nested").join("sessions.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(temp_root).expect("cleanup");
}
