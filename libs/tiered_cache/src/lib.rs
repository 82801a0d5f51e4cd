//! Two-tier cache: a fast ephemeral moka tier backed by a durable tier.
//!
//! Tier 1 holds bounded-lifetime entries keyed by the natural id or a
//! derived URL hash; tier 2 is a durable keyed store (the `DurableTier`
//! seam, implemented over postgres in the DAO layer) keyed only by stable
//! ids. Reads check tier 1, fall back to tier 2 and repopulate tier 1 on a
//! hit. Writes land in tier 1 unconditionally; the durable copy is written
//! by a background task with bounded retry, and exhaustion is logged, not
//! surfaced — the hot path stays valid even when the durable write fails.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, warn};

pub mod key;
pub mod retry;

pub use key::{KeyDescriptor, normalize_source_url};
pub use retry::RetryPolicy;

/// Durable backing store, keyed by the stable external identifier.
/// Implementations must treat keys as opaque.
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<String>>;
    async fn persist(&self, id: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("durable tier error: {0}")]
    Durable(#[from] anyhow::Error),
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_capacity() -> u64 { 10_000 }
fn default_ttl_secs() -> u64 { 300 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

struct DurableWrite {
    id: String,
    value: String,
}

async fn drain_durable_writes<D>(
    rx: flume::Receiver<DurableWrite>, durable: Arc<D>, policy: RetryPolicy,
) where
    D: DurableTier,
{
    while let Ok(write) = rx.recv_async().await {
        let outcome = policy
            .run(|| durable.persist(&write.id, &write.value))
            .await;
        match outcome {
            Ok(()) => {
                debug!(key = %write.id, "durable cache write complete");
            }
            Err(e) => {
                warn!(
                    key = %write.id,
                    error = %e,
                    attempts = policy.max_attempts,
                    "durable cache write exhausted retries; memory tier still valid"
                );
            }
        }
    }
}

/// Ephemeral tier over a durable tier with best-effort write-through.
pub struct TieredCache<D> {
    memory: Cache<String, CacheEntry>,
    durable: Arc<D>,
    ttl: Duration,
    writer_tx: flume::Sender<DurableWrite>,
}

impl<D> TieredCache<D>
where
    D: DurableTier + 'static,
{
    pub fn new(
        durable: Arc<D>, config: CacheConfig, retry: RetryPolicy,
    ) -> Self {
        let memory = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl())
            .build();

        let (writer_tx, rx) = flume::unbounded();
        tokio::spawn(drain_durable_writes(rx, durable.clone(), retry));

        Self { memory, durable, ttl: config.ttl(), writer_tx }
    }

    /// Tier 1, then tier 2 with tier-1 repopulation. Empty payloads are
    /// misses; they are never cached or returned.
    pub async fn get(
        &self, key: &KeyDescriptor,
    ) -> Result<Option<String>, CacheError> {
        let Some(t1_key) = key.tier1_key() else {
            return Ok(None);
        };

        if let Some(entry) = self.memory.get(&t1_key).await {
            if entry.expires_at > Instant::now() && !entry.value.is_empty()
            {
                return Ok(Some(entry.value));
            }
            // Entry aged out ahead of the builder TTL; drop it.
            self.memory.invalidate(&t1_key).await;
        }

        let Some(id) = key.tier2_key() else {
            return Ok(None);
        };

        match self.durable.fetch(id).await? {
            Some(value) if !value.is_empty() => {
                self.memory
                    .insert(
                        t1_key,
                        CacheEntry {
                            value: value.clone(),
                            expires_at: Instant::now() + self.ttl,
                        },
                    )
                    .await;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    /// Write tier 1 unconditionally; queue a best-effort durable write when
    /// a stable identifier is present. Never fails on durable-tier trouble.
    pub async fn store(
        &self, key: &KeyDescriptor, value: impl Into<String>,
        ttl: Option<Duration>,
    ) {
        let Some(t1_key) = key.tier1_key() else {
            return;
        };
        let value = value.into();
        if value.is_empty() {
            // Empty values are misses; drop any stale entry instead of
            // caching one.
            self.memory.invalidate(&t1_key).await;
            return;
        }
        let ttl = ttl.unwrap_or(self.ttl);

        self.memory
            .insert(
                t1_key,
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                },
            )
            .await;

        if let Some(id) = key.tier2_key() {
            let queued = self.writer_tx.send(DurableWrite {
                id: id.to_string(),
                value,
            });
            if queued.is_err() {
                warn!(key = %id, "durable writer task gone; skipping durable write");
            }
        }
    }

    /// Drop the tier-1 entry for a key (invalidation callbacks land here).
    pub async fn invalidate(&self, key: &KeyDescriptor) {
        if let Some(t1_key) = key.tier1_key() {
            self.memory.invalidate(&t1_key).await;
        }
    }

    /// Drop every tier-1 entry.
    pub fn invalidate_all(&self) { self.memory.invalidate_all(); }
}
