use chat_dao::{
    DenylistDao, MediaCacheDao, MessageDao, RetentionConfig,
    RetentionScheduler, TombstoneDao,
};
use chat_errors::ChatError;
use chat_models::{DenylistEntry, MessageSelector, NewMessage};
use test_utils::TestPostgresContainer;

fn new_message(channel_id: &str, author_id: &str) -> NewMessage {
    NewMessage {
        channel_id: channel_id.to_string(),
        personality_id: Some("pers-1".to_string()),
        persona_id: None,
        author_id: author_id.to_string(),
        content: "hello".to_string(),
    }
}

async fn seed_channel(
    dao: &MessageDao, channel_id: &str, count: usize,
) -> Vec<uuid::Uuid> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let message = dao
            .create(new_message(channel_id, &format!("user-{i}")))
            .await
            .unwrap();
        ids.push(message.id);
    }
    ids
}

#[tokio::test]
async fn create_and_find_round_trip() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MessageDao::new(container.sql_connect());

    let created = dao.create(new_message("chan-1", "user-1")).await.unwrap();
    let found = dao.find_by_id(created.id).await.unwrap();

    assert_eq!(found.id, created.id);
    assert_eq!(found.channel_id, "chan-1");
    assert_eq!(found.content, "hello");
    assert!(found.deleted_at.is_none());
}

#[tokio::test]
async fn find_by_id_missing_is_not_found() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MessageDao::new(container.sql_connect());

    let missing = uuid::Uuid::now_v7();
    let err = dao.find_by_id(missing).await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::NotFound { message_id } if message_id == missing
    ));
}

#[tokio::test]
async fn cursor_pagination_walks_live_history_newest_first() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MessageDao::new(container.sql_connect());
    seed_channel(&dao, "chan-p", 5).await;

    let (page, cursor) = dao
        .find_by_channel_with_cursor("chan-p", None, 2)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].created_at >= page[1].created_at);
    let cursor = cursor.expect("more pages remain");

    let (page2, cursor2) = dao
        .find_by_channel_with_cursor("chan-p", Some(cursor), 2)
        .await
        .unwrap();
    assert_eq!(page2.len(), 2);
    assert!(page2[0].created_at <= page[1].created_at);

    let (page3, cursor3) = dao
        .find_by_channel_with_cursor("chan-p", cursor2, 2)
        .await
        .unwrap();
    assert_eq!(page3.len(), 1);
    assert!(cursor3.is_none());
}

#[tokio::test]
async fn cursor_pagination_does_not_skip_shared_timestamps() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MessageDao::new(container.sql_connect());
    let ids = seed_channel(&dao, "chan-tie", 5).await;

    // Collapse every row onto one timestamp; only the id tiebreak orders
    // them now.
    container
        .execute_sql("UPDATE messages SET created_at = now()")
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let (page, next) = dao
            .find_by_channel_with_cursor("chan-tie", cursor, 2)
            .await
            .unwrap();
        seen.extend(page.iter().map(|m| m.id));
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(seen.len(), 5);
    for id in ids {
        assert!(seen.contains(&id));
    }
}

#[tokio::test]
async fn delete_with_tombstone_is_idempotent() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = container.sql_connect();
    let messages = MessageDao::new(db.clone());
    let tombstones = TombstoneDao::new(db);

    seed_channel(&messages, "chan-d", 3).await;
    seed_channel(&messages, "chan-keep", 1).await;

    let selector = MessageSelector::for_channel("chan-d");
    let deleted = messages.delete_with_tombstone(&selector).await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(tombstones.count().await.unwrap(), 3);

    // Second call matches nothing and writes nothing.
    let deleted = messages.delete_with_tombstone(&selector).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(tombstones.count().await.unwrap(), 3);

    // The other channel is untouched.
    assert_eq!(messages.count().await.unwrap(), 1);
}

#[tokio::test]
async fn tombstones_record_message_context() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = container.sql_connect();
    let messages = MessageDao::new(db.clone());
    let tombstones = TombstoneDao::new(db);

    let ids = seed_channel(&messages, "chan-t", 2).await;
    messages
        .delete_with_tombstone(&MessageSelector::for_ids(ids.clone()))
        .await
        .unwrap();

    for id in &ids {
        assert!(tombstones.exists(*id).await.unwrap());
    }
    let by_channel = tombstones.find_by_channel("chan-t").await.unwrap();
    assert_eq!(by_channel.len(), 2);
    assert_eq!(by_channel[0].personality_id.as_deref(), Some("pers-1"));
}

#[tokio::test]
async fn soft_delete_marks_rows_and_writes_tombstones_once() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = container.sql_connect();
    let messages = MessageDao::new(db.clone());
    let tombstones = TombstoneDao::new(db);

    let ids = seed_channel(&messages, "chan-s", 2).await;
    let selector = MessageSelector::for_channel("chan-s");

    let marked =
        messages.soft_delete_with_tombstone(&selector).await.unwrap();
    assert_eq!(marked, 2);
    assert_eq!(tombstones.count().await.unwrap(), 2);

    // Rows still exist but are excluded from live reads.
    let row = messages.find_by_id(ids[0]).await.unwrap();
    assert!(row.deleted_at.is_some());
    let (live, _) = messages
        .find_by_channel_with_cursor("chan-s", None, 10)
        .await
        .unwrap();
    assert!(live.is_empty());

    // Already-marked rows are not re-matched.
    let marked =
        messages.soft_delete_with_tombstone(&selector).await.unwrap();
    assert_eq!(marked, 0);
    assert_eq!(tombstones.count().await.unwrap(), 2);
}

#[tokio::test]
async fn empty_selector_is_rejected() {
    let container = TestPostgresContainer::new().await.unwrap();
    let messages = MessageDao::new(container.sql_connect());

    let err = messages
        .delete_with_tombstone(&MessageSelector::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::EmptySelector));
}

#[tokio::test]
async fn sweep_purges_only_expired_tombstones() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = container.sql_connect();
    let messages = MessageDao::new(db.clone());
    let tombstones = TombstoneDao::new(db);

    seed_channel(&messages, "chan-old", 1).await;
    seed_channel(&messages, "chan-new", 1).await;
    messages
        .delete_with_tombstone(&MessageSelector::for_channel("chan-old"))
        .await
        .unwrap();
    messages
        .delete_with_tombstone(&MessageSelector::for_channel("chan-new"))
        .await
        .unwrap();

    // Age one tombstone past the retention window.
    container
        .execute_sql(
            "UPDATE message_tombstones \
             SET deleted_at = now() - INTERVAL '40 days' \
             WHERE channel_id = 'chan-old'",
        )
        .await
        .unwrap();

    let swept = tombstones.sweep_expired_tombstones(30).await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(tombstones.count().await.unwrap(), 1);
}

#[tokio::test]
async fn aged_soft_deletes_are_hard_deleted_without_new_tombstones() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = container.sql_connect();
    let messages = MessageDao::new(db.clone());
    let tombstones = TombstoneDao::new(db.clone());

    let ids = seed_channel(&messages, "chan-g", 1).await;
    messages
        .soft_delete_with_tombstone(&MessageSelector::for_ids(ids.clone()))
        .await
        .unwrap();
    container
        .execute_sql(
            "UPDATE messages SET deleted_at = now() - INTERVAL '10 days'",
        )
        .await
        .unwrap();

    let scheduler = RetentionScheduler::new(
        db,
        RetentionConfig {
            retention_days: 30,
            grace_days: 7,
            interval_secs: 3600,
        },
    );
    let (swept, purged) = scheduler.run_once().await.unwrap();
    assert_eq!(swept, 0);
    assert_eq!(purged, 1);

    assert!(matches!(
        messages.find_by_id(ids[0]).await,
        Err(ChatError::NotFound { .. })
    ));
    // The soft delete already wrote the tombstone; the purge adds none.
    assert_eq!(tombstones.count().await.unwrap(), 1);
}

#[tokio::test]
async fn denylist_add_is_duplicate_tolerant() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = DenylistDao::new(container.sql_connect());

    let entry = DenylistEntry {
        guild_id: "g1".to_string(),
        channel_id: "c1".to_string(),
        user_id: "u1".to_string(),
        pattern: "spam".to_string(),
    };

    assert!(dao.add(&entry).await.unwrap());
    assert!(!dao.add(&entry).await.unwrap());
    assert_eq!(dao.find_by_guild("g1").await.unwrap().len(), 1);

    assert!(dao.remove(&entry).await.unwrap());
    assert!(!dao.remove(&entry).await.unwrap());
    assert!(dao.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn media_cache_upserts_by_key() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MediaCacheDao::new(container.sql_connect());

    assert_eq!(dao.get("att-1").await.unwrap(), None);

    dao.put("att-1", "a grey cat").await.unwrap();
    assert_eq!(
        dao.get("att-1").await.unwrap().as_deref(),
        Some("a grey cat")
    );

    dao.put("att-1", "a large grey cat").await.unwrap();
    assert_eq!(
        dao.get("att-1").await.unwrap().as_deref(),
        Some("a large grey cat")
    );

    assert!(dao.remove("att-1").await.unwrap());
    assert_eq!(dao.get("att-1").await.unwrap(), None);
}

#[tokio::test]
async fn media_cache_never_serves_empty_values() {
    let container = TestPostgresContainer::new().await.unwrap();
    let dao = MediaCacheDao::new(container.sql_connect());

    dao.put("att-2", "").await.unwrap();
    assert_eq!(dao.get("att-2").await.unwrap(), None);

    // An empty upsert over a real value also reads back as a miss.
    dao.put("att-2", "a muffled recording").await.unwrap();
    dao.put("att-2", "").await.unwrap();
    assert_eq!(dao.get("att-2").await.unwrap(), None);
}
