pub use config::{DbConnectConfig, DbOptionsConfig, PostgresDbConfig};
pub use deadpool_postgres;
pub use deadpool_postgres::PoolError;
pub use tokio_postgres::Error as PgError;

pub mod config;
mod pool;

pub use pool::connect_postgres_db;

use deadpool_postgres::{Object, Pool};

/// Handle every DAO takes at construction. Explicitly built from a pool the
/// caller owns; there is no process-global fallback.
#[derive(Debug, Clone)]
pub struct SqlConnect {
    pool: Pool,
}

impl SqlConnect {
    pub fn new(pool: Pool) -> Self { Self { pool } }

    /// Get connection for write operations
    pub async fn get_client(
        &self,
    ) -> Result<Object, deadpool_postgres::PoolError> {
        self.pool.get().await
    }

    /// Get connection for read operations
    pub async fn get_read_client(
        &self,
    ) -> Result<Object, deadpool_postgres::PoolError> {
        self.pool.get().await
    }

    /// Get pool statistics for monitoring
    pub fn get_pool_status(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.available, status.size)
    }
}
