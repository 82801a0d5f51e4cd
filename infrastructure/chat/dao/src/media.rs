use async_trait::async_trait;
use chat_errors::ChatError;
use sql_connection::SqlConnect;
use tiered_cache::DurableTier;
use tracing::instrument;

/// Durable tier for image/voice descriptions: keyed get/put over the
/// `media_cache` table. Keys are stable external identifiers, never hashes.
#[derive(Clone)]
pub struct MediaCacheDao {
    db: SqlConnect,
}

impl MediaCacheDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    pub async fn get(
        &self, cache_key: &str,
    ) -> Result<Option<String>, ChatError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare("SELECT value FROM media_cache WHERE cache_key = $1")
            .await?;
        let rows = client.query(&stmt, &[&cache_key]).await?;
        // Empty values are misses, not hits.
        Ok(rows
            .first()
            .map(|row| row.get::<_, String>(0))
            .filter(|value| !value.is_empty()))
    }

    #[instrument(skip(self, value), fields(cache_key))]
    pub async fn put(
        &self, cache_key: &str, value: &str,
    ) -> Result<(), ChatError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "INSERT INTO media_cache (cache_key, value, updated_at) \
                 VALUES ($1, $2, now()) \
                 ON CONFLICT (cache_key) DO UPDATE \
                 SET value = EXCLUDED.value, updated_at = now()",
            )
            .await?;
        client.execute(&stmt, &[&cache_key, &value]).await?;
        Ok(())
    }

    pub async fn remove(&self, cache_key: &str) -> Result<bool, ChatError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare("DELETE FROM media_cache WHERE cache_key = $1")
            .await?;
        let removed = client.execute(&stmt, &[&cache_key]).await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl DurableTier for MediaCacheDao {
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get(id).await?)
    }

    async fn persist(&self, id: &str, value: &str) -> anyhow::Result<()> {
        Ok(self.put(id, value).await?)
    }
}
