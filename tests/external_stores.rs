//! Runs against live services:
//! `DATABASE_URL=... REDIS_URL=... cargo test --test external_stores -- --ignored`

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use cvmaker::{
    db,
    models::{
        cv::ProfileKey,
        session::{DeviceClass, NewSession},
    },
    repositories::{
        profile::{ProfileStore, RedisProfileStore},
        session::{PgSessionLedger, SessionLedger},
        user::{PgUserDirectory, UserDirectory},
    },
};

fn get_timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

fn login_from(user_id: i64) -> NewSession {
    NewSession {
        id: Uuid::new_v4(),
        user_id,
        device_class: DeviceClass::Desktop,
        origin: "127.0.0.1".to_string(),
    }
}

async fn pg_ledger(max_sessions: usize) -> (PgSessionLedger, i64) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::create_pool(&url).unwrap();
    db::ensure_schema(&pool).await.unwrap();

    let users = PgUserDirectory::new(pool.clone());
    let email = format!("ledger_{}@example.com", get_timestamp());
    let user = users.create_user("Ledger Test", &email, "not-a-hash").await.unwrap();

    (PgSessionLedger::new(pool, max_sessions), user.id)
}

async fn redis_store() -> RedisProfileStore {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
    let client = redis::Client::open(url).unwrap();
    RedisProfileStore::new(client.get_connection_manager().await.unwrap())
}

#[tokio::test]
#[ignore]
async fn pg_ledger_keeps_the_most_recent_sessions() {
    let (ledger, user_id) = pg_ledger(5).await;

    let mut recorded = Vec::new();
    for _ in 0..6 {
        recorded.push(ledger.record_session(login_from(user_id)).await.unwrap().id);
    }

    let live: Vec<Uuid> = ledger
        .list_for_user(user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|session| session.id)
        .collect();
    let newest_five: Vec<Uuid> = recorded[1..].iter().rev().copied().collect();
    assert_eq!(live, newest_five);
    assert!(!ledger.is_active(recorded[0]).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn pg_ledger_bound_holds_under_concurrent_logins() {
    let (ledger, user_id) = pg_ledger(3).await;
    let ledger = Arc::new(ledger);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.record_session(login_from(user_id)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(ledger.list_for_user(user_id).await.unwrap().len(), 3);
}

#[tokio::test]
#[ignore]
async fn redis_delist_by_position_then_by_stale_position() {
    let store = redis_store().await;
    let owner = (get_timestamp() % i64::MAX as u128) as i64;
    let cook = ProfileKey::new(owner, "cook");
    let pilot = ProfileKey::new(owner, "pilot");
    let ttl = Duration::from_secs(60);

    store.put(&cook, "{}", ttl).await.unwrap();
    store.put(&cook, "{}", ttl).await.unwrap();
    store.put(&pilot, "{}", ttl).await.unwrap();
    assert!(store.time_to_live(&cook).await.unwrap().is_some());

    let ours = |entries: Vec<cvmaker::repositories::profile::IndexEntry>| -> Vec<_> {
        entries
            .into_iter()
            .filter(|entry| entry.key.owner_id == owner)
            .collect()
    };

    let entries = ours(store.list_index().await.unwrap());
    assert_eq!(entries.len(), 3);
    let first_cook = entries.iter().find(|entry| entry.key == cook).unwrap().position;
    assert!(store.remove(first_cook, &cook).await.unwrap());

    // the slot we name holds pilot now, so one cook goes by value
    let entries = ours(store.list_index().await.unwrap());
    let pilot_at = entries.iter().find(|entry| entry.key == pilot).unwrap().position;
    assert!(store.remove(pilot_at, &cook).await.unwrap());

    let entries = ours(store.list_index().await.unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, pilot);
    assert!(!store.remove(entries[0].position, &cook).await.unwrap());

    assert!(store.remove(entries[0].position, &pilot).await.unwrap());
    assert!(ours(store.list_index().await.unwrap()).is_empty());
}
