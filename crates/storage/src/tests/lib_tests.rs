use super::*;
use shared::domain::MenuState;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

async fn expires_at(storage: &Storage, session_id: &str) -> i64 {
    sqlx::query_scalar("SELECT expires_at FROM ussd_sessions WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(storage.pool())
        .await
        .expect("expires_at")
}

async fn row_count(storage: &Storage) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM ussd_sessions")
        .fetch_one(storage.pool())
        .await
        .expect("count")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn missing_session_is_absent() {
    let storage = memory_storage().await;
    assert!(storage.get("nope").await.expect("get").is_none());
}

#[tokio::test]
async fn stores_and_loads_session() {
    let storage = memory_storage().await;
    let mut session = UssdSession::new("s-1", "+254700000001");
    session.current_menu = MenuState::VerifyCode;
    session.election_id = Some("e-1".into());
    session.voter_id = Some("V123".into());

    storage
        .put(&mut session, Duration::from_secs(600))
        .await
        .expect("put");
    let loaded = storage.get("s-1").await.expect("get").expect("present");
    assert_eq!(loaded, session);
}

#[tokio::test]
async fn put_overwrites_previous_record() {
    let storage = memory_storage().await;
    let mut session = UssdSession::new("s-2", "+254700000002");
    storage
        .put(&mut session, Duration::from_secs(600))
        .await
        .expect("put");

    session.current_menu = MenuState::BallotPosition;
    session.voting_progress.current_position_index = 2;
    storage
        .put(&mut session, Duration::from_secs(600))
        .await
        .expect("put again");

    let loaded = storage.get("s-2").await.expect("get").expect("present");
    assert_eq!(loaded.current_menu, MenuState::BallotPosition);
    assert_eq!(loaded.voting_progress.current_position_index, 2);
    assert_eq!(row_count(&storage).await, 1);
}

#[tokio::test]
async fn short_ttl_is_clamped_to_one_minute() {
    let storage = memory_storage().await;
    let mut session = UssdSession::new("s-3", "+254700000003");
    storage
        .put(&mut session, Duration::from_secs(5))
        .await
        .expect("put");

    let ttl = expires_at(&storage, "s-3").await - session.last_activity.timestamp();
    assert_eq!(ttl, MIN_SESSION_TTL.as_secs() as i64);
}

#[tokio::test]
async fn huge_ttl_saturates_instead_of_expiring() {
    let storage = memory_storage().await;
    let mut session = UssdSession::new("s-huge", "+254700000009");
    storage
        .put(&mut session, Duration::from_secs(u64::MAX))
        .await
        .expect("put");

    assert_eq!(expires_at(&storage, "s-huge").await, i64::MAX);
    assert!(storage.get("s-huge").await.expect("get").is_some());

    let mut session = UssdSession::new("s-edge", "+254700000010");
    storage
        .put(&mut session, Duration::from_secs(i64::MAX as u64))
        .await
        .expect("put");
    assert!(storage.get("s-edge").await.expect("get").is_some());
}

#[tokio::test]
async fn expired_session_is_absent_and_removed() {
    let storage = memory_storage().await;
    let session = UssdSession::new("s-4", "+254700000004");
    sqlx::query("INSERT INTO ussd_sessions (session_id, payload, expires_at) VALUES (?, ?, ?)")
        .bind("s-4")
        .bind(serde_json::to_string(&session).expect("json"))
        .bind(Utc::now().timestamp() - 10)
        .execute(storage.pool())
        .await
        .expect("insert");

    assert!(storage.get("s-4").await.expect("get").is_none());
    assert_eq!(row_count(&storage).await, 0);
}

#[tokio::test]
async fn corrupted_session_is_discarded() {
    let storage = memory_storage().await;
    sqlx::query("INSERT INTO ussd_sessions (session_id, payload, expires_at) VALUES (?, ?, ?)")
        .bind("s-5")
        .bind("{not json")
        .bind(Utc::now().timestamp() + 600)
        .execute(storage.pool())
        .await
        .expect("insert");

    assert!(storage.get("s-5").await.expect("get").is_none());
    assert_eq!(row_count(&storage).await, 0);
}

#[tokio::test]
async fn delete_removes_session() {
    let storage = memory_storage().await;
    let mut session = UssdSession::new("s-6", "+254700000006");
    storage
        .put(&mut session, Duration::from_secs(600))
        .await
        .expect("put");
    storage.delete("s-6").await.expect("delete");
    storage.delete("s-6").await.expect("delete is idempotent");
    assert!(storage.get("s-6").await.expect("get").is_none());
}

#[tokio::test]
async fn purge_expired_keeps_live_sessions() {
    let storage = memory_storage().await;
    let mut live = UssdSession::new("live", "+254700000007");
    storage
        .put(&mut live, Duration::from_secs(600))
        .await
        .expect("put");
    sqlx::query("INSERT INTO ussd_sessions (session_id, payload, expires_at) VALUES (?, ?, ?)")
        .bind("stale")
        .bind("{}")
        .bind(Utc::now().timestamp() - 1)
        .execute(storage.pool())
        .await
        .expect("insert");

    assert_eq!(storage.purge_expired().await.expect("purge"), 1);
    assert!(storage.get("live").await.expect("get").is_some());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("sessions.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}
