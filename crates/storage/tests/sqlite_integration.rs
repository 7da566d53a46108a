use chrono::Duration;
use storage::repository::{StateStore, Storage};
use storage::sqlite::SqliteRepository;
use watch_core::Clock;
use watch_core::model::{SessionId, UserId};
use watch_core::time::fixed_now;

#[tokio::test]
async fn sqlite_roundtrip_state_logs() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_state_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect")
        .with_clock(Clock::fixed(fixed_now()));
    repo.migrate().await.expect("migrate");

    let session = SessionId::new(7);
    let user = UserId::new(3);
    repo.save_state(session, r#"{"slide":2}"#, user, false)
        .await
        .expect("save draft");

    let later = repo.clone().with_clock(Clock::fixed(fixed_now() + Duration::minutes(5)));
    later
        .save_state(session, r#"{"slide":4}"#, user, true)
        .await
        .expect("save final");

    let logs = repo.load_state(session, &[user]).await.expect("load");
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].payload, r#"{"slide":2}"#);
    assert!(!logs[0].is_final);
    assert_eq!(logs[1].payload, r#"{"slide":4}"#);
    assert!(logs[1].is_final);
    assert_eq!(logs[1].saved_at, fixed_now() + Duration::minutes(5));
    assert_eq!(logs[1].session_id, session);
    assert_eq!(logs[1].user_id, user);
}

#[tokio::test]
async fn sqlite_filters_by_user_set() {
    let storage = Storage::sqlite("sqlite:file:memdb_state_users?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let session = SessionId::new(1);

    for user in 1..=3 {
        storage
            .states
            .save_state(session, "{}", UserId::new(user), false)
            .await
            .expect("save");
    }
    storage
        .states
        .save_state(SessionId::new(2), "{}", UserId::new(1), false)
        .await
        .expect("save other session");

    let logs = storage
        .states
        .load_state(session, &[UserId::new(1), UserId::new(3)])
        .await
        .expect("load");
    let users: Vec<u64> = logs.iter().map(|l| l.user_id.value()).collect();
    assert_eq!(users, vec![1, 3]);

    let none = storage
        .states
        .load_state(session, &[])
        .await
        .expect("load empty");
    assert!(none.is_empty());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_state_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn sqlite_unknown_session_loads_no_logs() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_state_unknown?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let logs = repo
        .load_state(SessionId::new(404), &[UserId::new(1)])
        .await
        .expect("missing state is not an error");
    assert!(logs.is_empty());
}
