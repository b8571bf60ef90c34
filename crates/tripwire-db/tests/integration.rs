//! Integration tests for the `tripwire-db` persistence layer.
//!
//! `SQLite` runs in-process, so these need no external services. In-memory
//! databases are per-connection; pools here are capped at one connection.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use tripwire_db::{DbError, RuleStateStore, SqliteConfig, StatePool};
use tripwire_types::{PersistedRuleState, RuleId, ScopeKey};

async fn memory_pool() -> StatePool {
    let config = SqliteConfig::new("sqlite::memory:")
        .with_max_connections(1)
        .with_connect_timeout(Duration::from_secs(1));
    assert_eq!(config.connect_timeout, Duration::from_secs(1));
    StatePool::connect(&config).await.unwrap()
}

fn record(scope: ScopeKey, rule: &str, fire_count: u32, secs: Option<i64>) -> PersistedRuleState {
    PersistedRuleState {
        rule_id: RuleId::from(rule),
        scope,
        fire_count,
        last_fired_at: secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
    }
}

#[tokio::test]
async fn save_then_load_returns_sorted_records() {
    let pool = memory_pool().await;
    let store = RuleStateStore::new(pool.pool());

    let records = vec![
        record(ScopeKey::room("cellar"), "lever", 1, Some(1_700_000_000)),
        record(ScopeKey::area("old_mine"), "collapse", 0, None),
        record(ScopeKey::room("cellar"), "chest", 3, Some(1_700_000_100)),
    ];
    store.save_all(&records).await.unwrap();

    let loaded = store.load_all().await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0], records[1]);
    assert_eq!(loaded[1], records[2]);
    assert_eq!(loaded[2], records[0]);
}

#[tokio::test]
async fn saving_again_overwrites_existing_rows() {
    let pool = memory_pool().await;
    let store = RuleStateStore::new(pool.pool());

    store
        .save_all(&[record(ScopeKey::room("cellar"), "lever", 1, Some(1_700_000_000))])
        .await
        .unwrap();
    let newer = record(ScopeKey::room("cellar"), "lever", 2, Some(1_700_000_500));
    store.save_all(std::slice::from_ref(&newer)).await.unwrap();

    assert_eq!(store.load_all().await.unwrap(), vec![newer]);
}

#[tokio::test]
async fn scopes_can_be_loaded_and_deleted_independently() {
    let pool = memory_pool().await;
    let store = RuleStateStore::new(pool.pool());
    store
        .save_all(&[
            record(ScopeKey::room("cellar"), "lever", 1, None),
            record(ScopeKey::room("cellar"), "chest", 1, None),
            record(ScopeKey::room("hall"), "lever", 4, None),
        ])
        .await
        .unwrap();

    let hall = store.load_scope(&ScopeKey::room("hall")).await.unwrap();
    assert_eq!(hall.len(), 1);
    assert_eq!(hall[0].fire_count, 4);

    assert_eq!(store.delete_scope(&ScopeKey::room("cellar")).await.unwrap(), 2);
    assert_eq!(store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_rows_are_reported() {
    let pool = memory_pool().await;
    sqlx::query(
        "INSERT INTO trigger_state (scope, rule_id, fire_count, last_fired_at, updated_at)
         VALUES ('kitchen', 'stove', 1, NULL, '2024-01-01T00:00:00Z')",
    )
    .execute(pool.pool())
    .await
    .unwrap();

    let err = RuleStateStore::new(pool.pool()).load_all().await.unwrap_err();
    assert!(matches!(err, DbError::Corrupt { ref scope, .. } if scope == "kitchen"));
}

#[tokio::test]
async fn file_databases_survive_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("state.db").display());
    let saved = record(ScopeKey::room("cellar"), "lever", 1, Some(1_700_000_000));

    let first = StatePool::connect_url(&url).await.unwrap();
    RuleStateStore::new(first.pool())
        .save_all(std::slice::from_ref(&saved))
        .await
        .unwrap();
    first.close().await;

    let second = StatePool::connect_url(&url).await.unwrap();
    let loaded = RuleStateStore::new(second.pool()).load_all().await.unwrap();
    assert_eq!(loaded, vec![saved]);
}
