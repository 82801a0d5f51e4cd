//! Mutation handlers composing the DAOs with cache invalidation, and the
//! media-description cache facade.

use std::sync::Arc;

use chat_dao::{DenylistDao, MediaCacheDao};
use chat_errors::ChatError;
use chat_models::DenylistEntry;
use invalidation::{
    ChannelError, DenylistEntryRef, DenylistEvent, InvalidationChannel,
    denylist_binding,
};
use redis_connection::RedisConnectionManager;
use sql_connection::SqlConnect;
use tiered_cache::{
    CacheConfig, CacheError, KeyDescriptor, RetryPolicy, TieredCache,
};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] ChatError),
    /// The mutation committed but the invalidation broadcast failed; remote
    /// caches may serve stale entries until their next refresh.
    #[error("invalidation publish failed: {0}")]
    Publish(#[from] ChannelError),
}

fn entry_ref(entry: &DenylistEntry) -> DenylistEntryRef {
    DenylistEntryRef {
        guild_id: entry.guild_id.clone(),
        channel_id: entry.channel_id.clone(),
        user_id: entry.user_id.clone(),
        pattern: entry.pattern.clone(),
    }
}

/// Denylist mutations with exactly-one-publish semantics: a mutation that
/// changed a row broadcasts one matching event; a no-op broadcasts nothing.
#[derive(Clone)]
pub struct DenylistCommandHandler {
    dao: DenylistDao,
    channel: Arc<InvalidationChannel<DenylistEvent>>,
}

impl DenylistCommandHandler {
    pub fn new(db: SqlConnect, redis: RedisConnectionManager) -> Self {
        Self {
            dao: DenylistDao::new(db),
            channel: Arc::new(InvalidationChannel::new(
                redis,
                denylist_binding(),
            )),
        }
    }

    pub fn channel(&self) -> &Arc<InvalidationChannel<DenylistEvent>> {
        &self.channel
    }

    #[instrument(skip(self), fields(guild_id = %entry.guild_id))]
    pub async fn add(
        &self, entry: DenylistEntry,
    ) -> Result<bool, HandlerError> {
        let changed = self.dao.add(&entry).await?;
        if changed {
            self.channel
                .publish(&DenylistEvent::Add { entry: entry_ref(&entry) })
                .await?;
        }
        Ok(changed)
    }

    #[instrument(skip(self), fields(guild_id = %entry.guild_id))]
    pub async fn remove(
        &self, entry: DenylistEntry,
    ) -> Result<bool, HandlerError> {
        let changed = self.dao.remove(&entry).await?;
        if changed {
            self.channel
                .publish(&DenylistEvent::Remove { entry: entry_ref(&entry) })
                .await?;
        }
        Ok(changed)
    }
}

/// Image/voice description cache: moka in front of the `media_cache` table.
pub struct MediaDescriptionService {
    cache: TieredCache<MediaCacheDao>,
}

impl MediaDescriptionService {
    pub fn new(
        db: SqlConnect, config: CacheConfig, retry: RetryPolicy,
    ) -> Self {
        Self {
            cache: TieredCache::new(
                Arc::new(MediaCacheDao::new(db)),
                config,
                retry,
            ),
        }
    }

    pub async fn describe_lookup(
        &self, key: &KeyDescriptor,
    ) -> Result<Option<String>, CacheError> {
        self.cache.get(key).await
    }

    pub async fn remember(&self, key: &KeyDescriptor, description: &str) {
        self.cache.store(key, description, None).await;
    }

    pub async fn forget(&self, key: &KeyDescriptor) {
        self.cache.invalidate(key).await;
    }

    pub fn forget_all(&self) { self.cache.invalidate_all(); }
}
