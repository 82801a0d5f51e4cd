use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use chat_command_handlers::DenylistCommandHandler;
use chat_models::DenylistEntry;
use invalidation::DenylistEvent;
use test_utils::{TestPostgresContainer, TestRedisContainer};
use tokio::time::sleep;

const DELIVERY_WAIT: Duration = Duration::from_millis(500);

fn entry() -> DenylistEntry {
    DenylistEntry {
        guild_id: "g1".to_string(),
        channel_id: "c1".to_string(),
        user_id: "u1".to_string(),
        pattern: "spam".to_string(),
    }
}

#[tokio::test]
async fn effective_mutations_publish_exactly_once() {
    let postgres = TestPostgresContainer::new().await.unwrap();
    let redis = TestRedisContainer::new().await.unwrap();

    let handler = DenylistCommandHandler::new(
        postgres.sql_connect(),
        redis.connection_manager(),
    );

    let adds = Arc::new(AtomicU32::new(0));
    let removes = Arc::new(AtomicU32::new(0));
    let (add_count, remove_count) = (adds.clone(), removes.clone());
    handler
        .channel()
        .subscribe(Arc::new(move |event: &DenylistEvent| {
            match event {
                DenylistEvent::Add { .. } => {
                    add_count.fetch_add(1, Ordering::SeqCst);
                }
                DenylistEvent::Remove { .. } => {
                    remove_count.fetch_add(1, Ordering::SeqCst);
                }
                DenylistEvent::All => {}
            }
            Ok(())
        }))
        .await
        .unwrap();

    // First add changes a row and broadcasts; the duplicate is silent.
    assert!(handler.add(entry()).await.unwrap());
    assert!(!handler.add(entry()).await.unwrap());
    sleep(DELIVERY_WAIT).await;
    assert_eq!(adds.load(Ordering::SeqCst), 1);
    assert_eq!(removes.load(Ordering::SeqCst), 0);

    // Same contract on the way out.
    assert!(handler.remove(entry()).await.unwrap());
    assert!(!handler.remove(entry()).await.unwrap());
    sleep(DELIVERY_WAIT).await;
    assert_eq!(adds.load(Ordering::SeqCst), 1);
    assert_eq!(removes.load(Ordering::SeqCst), 1);
}
