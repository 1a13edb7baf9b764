use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::UssdSession;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::warn;

/// Sessions never live shorter than this, whatever the caller asks for.
pub const MIN_SESSION_TTL: Duration = Duration::from_secs(60);

/// Durable mapping from USSD session id to the in-progress dialog.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Missing, expired and unreadable records all come back as `None`.
    async fn get(&self, session_id: &str) -> Result<Option<UssdSession>>;
    /// Refreshes `last_activity` and stores the session for `ttl`
    /// (clamped to [`MIN_SESSION_TTL`]).
    async fn put(&self, session: &mut UssdSession, ttl: Duration) -> Result<()>;
    async fn delete(&self, session_id: &str) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Drops every session whose ttl has elapsed. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ussd_sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn discard(&self, session_id: &str, reason: &'static str) {
        if let Err(error) = self.delete(session_id).await {
            warn!(%session_id, %error, reason, "failed to discard session record");
        }
    }
}

#[async_trait]
impl SessionStore for Storage {
    async fn get(&self, session_id: &str) -> Result<Option<UssdSession>> {
        let row = sqlx::query("SELECT payload, expires_at FROM ussd_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load session")?;
        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: i64 = row.try_get("expires_at")?;
        if expires_at <= Utc::now().timestamp() {
            self.discard(session_id, "expired").await;
            return Ok(None);
        }

        let payload: String = row.try_get("payload")?;
        match serde_json::from_str::<UssdSession>(&payload) {
            Ok(session) => Ok(Some(session)),
            Err(error) => {
                warn!(%session_id, %error, "discarding corrupted session record");
                self.discard(session_id, "corrupted").await;
                Ok(None)
            }
        }
    }

    async fn put(&self, session: &mut UssdSession, ttl: Duration) -> Result<()> {
        session.touch();
        let ttl = ttl.max(MIN_SESSION_TTL);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = session.last_activity.timestamp().saturating_add(ttl_secs);
        let payload = serde_json::to_string(session).context("failed to encode session")?;

        sqlx::query(
            "INSERT INTO ussd_sessions (session_id, payload, expires_at, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(session_id) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&session.session_id)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .context("failed to save session")?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM ussd_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
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
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
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
#[path = "tests/lib_tests.rs"]
mod tests;
