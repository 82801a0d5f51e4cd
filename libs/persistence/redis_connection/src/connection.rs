use deadpool_redis::{Connection, Pool, PoolError};

/// Owns the pooled command path and hands out dedicated subscriber
/// connections. Multiplexed pool connections cannot enter subscriber mode,
/// so every listener opens its own connection from the underlying client.
#[derive(Clone)]
pub struct RedisConnectionManager {
    pool: Pool,
    client: redis::Client,
}

impl RedisConnectionManager {
    pub fn new(pool: Pool, client: redis::Client) -> Self {
        Self { pool, client }
    }

    /// Pooled connection for commands and PUBLISH.
    pub async fn get_connection(&self) -> Result<Connection, PoolError> {
        self.pool.get().await
    }

    /// Open a dedicated pub/sub connection. The caller owns it exclusively;
    /// dropping it releases the server-side subscription.
    pub async fn get_pubsub(
        &self,
    ) -> Result<redis::aio::PubSub, redis::RedisError> {
        self.client.get_async_pubsub().await
    }
}
