//! Generic invalidation broadcaster/listener over redis pub/sub.
//!
//! One audited implementation is reused by every cache domain; a domain
//! supplies only its `ChannelBinding` (topic, schema, log-context
//! extractor). Stale-cache bugs are silent in production, so the delivery
//! path is deliberately defensive: undecodable or schema-invalid messages
//! are logged and dropped, and a failing callback never starves the rest.

use std::sync::Arc;

use deadpool_redis::redis::AsyncCommands;
use futures::StreamExt;
use redis_connection::RedisConnectionManager;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::{Mutex, RwLock}, task::JoinHandle};
use tracing::{debug, instrument, warn};

use crate::schema::EventSchema;

/// Invalidation callbacks are fallible so one bad cache holder cannot take
/// the listener down; errors are logged and delivery continues.
pub type Callback<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Pairing of a broadcast topic with its event shape and validator.
pub struct ChannelBinding<E> {
    pub topic: &'static str,
    pub schema: &'static EventSchema,
    pub describe: fn(&E) -> String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("redis transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("event encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Broadcaster/listener for one cache domain.
///
/// Owns at most one inbound pub/sub connection regardless of how many
/// local callbacks register; the outbound publish path borrows pooled
/// connections and may be used concurrently.
pub struct InvalidationChannel<E> {
    redis: RedisConnectionManager,
    binding: ChannelBinding<E>,
    callbacks: Arc<RwLock<Vec<Callback<E>>>>,
    // None = idle. Holding this lock during setup is the `subscribing`
    // state; concurrent subscribe calls queue behind it.
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<E> InvalidationChannel<E>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        redis: RedisConnectionManager, binding: ChannelBinding<E>,
    ) -> Self {
        Self {
            redis,
            binding,
            callbacks: Arc::new(RwLock::new(Vec::new())),
            listener: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &'static str { self.binding.topic }

    /// Register a callback for valid events on this channel.
    ///
    /// The first successful call opens the dedicated inbound connection and
    /// subscribes to the bound topic; later calls only add their callback.
    /// If setup fails, nothing is registered, the connection is released and
    /// the channel stays idle so a later call can retry.
    pub async fn subscribe(
        &self, callback: Callback<E>,
    ) -> Result<(), ChannelError> {
        let mut listener = self.listener.lock().await;

        if listener.is_none() {
            let mut pubsub = self.redis.get_pubsub().await?;
            pubsub.subscribe(self.binding.topic).await?;

            let topic = self.binding.topic;
            let schema = self.binding.schema;
            let describe = self.binding.describe;
            let callbacks = self.callbacks.clone();

            *listener = Some(tokio::spawn(async move {
                let mut stream = pubsub.into_on_message();
                while let Some(msg) = stream.next().await {
                    if msg.get_channel_name() != topic {
                        continue;
                    }
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(topic, error = %e, "dropping non-text invalidation message");
                            continue;
                        }
                    };
                    let decoded: serde_json::Value =
                        match serde_json::from_str(&payload) {
                            Ok(decoded) => decoded,
                            Err(e) => {
                                warn!(topic, error = %e, "dropping undecodable invalidation message");
                                continue;
                            }
                        };
                    if !schema.validate(&decoded) {
                        warn!(topic, %payload, "dropping schema-invalid invalidation message");
                        continue;
                    }
                    let event: E = match serde_json::from_value(decoded) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(topic, error = %e, "dropping unmappable invalidation message");
                            continue;
                        }
                    };

                    let snapshot = callbacks.read().await.clone();
                    debug!(
                        topic,
                        context = %describe(&event),
                        callbacks = snapshot.len(),
                        "delivering invalidation event"
                    );
                    for cb in snapshot {
                        if let Err(e) = cb(&event) {
                            warn!(
                                topic,
                                context = %describe(&event),
                                error = %e,
                                "invalidation callback failed"
                            );
                        }
                    }
                }
                debug!(topic, "invalidation listener stream ended");
            }));
        }

        self.callbacks.write().await.push(callback);
        Ok(())
    }

    /// Publish one event on the bound topic. Transport failures propagate:
    /// the mutation that triggered the publish decides whether to retry.
    #[instrument(skip_all, fields(topic = self.binding.topic))]
    pub async fn publish(&self, event: &E) -> Result<(), ChannelError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.redis.get_connection().await?;
        let receivers: i64 =
            conn.publish(self.binding.topic, payload).await?;

        debug!(
            context = %(self.binding.describe)(event),
            receivers,
            "published invalidation event"
        );
        Ok(())
    }

    /// Tear down the inbound connection and clear all callbacks. No-op when
    /// already idle.
    pub async fn unsubscribe(&self) {
        let mut listener = self.listener.lock().await;
        if let Some(task) = listener.take() {
            // Dropping the stream closes the dedicated connection.
            task.abort();
        }
        self.callbacks.write().await.clear();
    }

    /// Whether an inbound subscription is currently active.
    pub async fn is_subscribed(&self) -> bool {
        self.listener.lock().await.is_some()
    }
}
