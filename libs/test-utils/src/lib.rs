//! Container-backed fixtures for integration tests: a PostgreSQL container
//! bootstrapped with the chat schema, and a Redis container wired into a
//! `RedisConnectionManager`.

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{
    Manager, ManagerConfig, Pool as PostgresPool, RecyclingMethod,
};
use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
use redis_connection::RedisConnectionManager;
use sql_connection::SqlConnect;
use testcontainers_modules::{
    postgres::Postgres,
    redis::Redis,
    testcontainers::{ImageExt, runners::AsyncRunner},
};
use tokio_postgres::NoTls;

const SCHEMA_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        channel_id TEXT NOT NULL,
        personality_id TEXT,
        persona_id TEXT,
        author_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        deleted_at TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_channel_created
        ON messages (channel_id, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS message_tombstones (
        message_id UUID PRIMARY KEY,
        channel_id TEXT NOT NULL,
        personality_id TEXT,
        persona_id TEXT,
        deleted_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS denylist_entries (
        guild_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        pattern TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (guild_id, channel_id, user_id, pattern)
    )",
    "CREATE TABLE IF NOT EXISTS media_cache (
        cache_key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

pub struct TestPostgresContainer {
    pub pool: PostgresPool,
    pub connection_string: String,
    // Keep the container alive for the lifetime of this struct
    _container:
        testcontainers_modules::testcontainers::ContainerAsync<Postgres>,
}

impl TestPostgresContainer {
    /// Start a fresh PostgreSQL container, build a pool against it, and
    /// apply the chat schema.
    pub async fn new() -> Result<Self> {
        let container = Postgres::default()
            .with_env_var("POSTGRES_DB", "testdb")
            .with_env_var("POSTGRES_USER", "testuser")
            .with_env_var("POSTGRES_PASSWORD", "testpass")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let connection_string =
            format!("postgresql://testuser:testpass@{host}:{port}/testdb");

        let pool = Self::create_pool(&connection_string).await?;

        let instance = Self {
            pool,
            connection_string,
            _container: container,
        };

        instance.apply_schema().await?;

        Ok(instance)
    }

    /// `SqlConnect` handle over this container's pool, as the DAOs take it.
    pub fn sql_connect(&self) -> SqlConnect {
        SqlConnect::new(self.pool.clone())
    }

    async fn create_pool(connection_string: &str) -> Result<PostgresPool> {
        let pg_config = connection_string.parse::<tokio_postgres::Config>()?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);

        let pool = PostgresPool::builder(mgr)
            .max_size(10)
            .build()
            .context("Failed to build PostgreSQL connection pool")?;

        let mut attempts = 0;
        loop {
            match pool.get().await {
                Ok(client) => match client.query_one("SELECT 1", &[]).await {
                    Ok(_) => break,
                    Err(_) if attempts < 20 => {
                        attempts += 1;
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                    Err(e) => {
                        return Err(e).context("PostgreSQL not ready");
                    }
                },
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .context("Failed to get PostgreSQL connection");
                }
            }
        }

        Ok(pool)
    }

    pub async fn execute_sql(&self, sql: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(sql, &[])
            .await
            .context("Failed to execute SQL")?;
        Ok(())
    }

    async fn apply_schema(&self) -> Result<()> {
        for ddl in SCHEMA_DDL {
            self.execute_sql(ddl).await?;
        }
        Ok(())
    }
}

pub struct TestRedisContainer {
    pub pool: RedisPool,
    pub client: redis::Client,
    pub connection_string: String,
    pub host: String,
    pub port: u16,
    // Keep the container alive for the lifetime of this struct
    _container: testcontainers_modules::testcontainers::ContainerAsync<Redis>,
}

impl TestRedisContainer {
    /// Start a fresh Redis container and wait for it to answer PING.
    pub async fn new() -> Result<Self> {
        let container = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(6379).await?;
        let connection_string = format!("redis://{host}:{port}");

        let pool = Self::create_pool(&connection_string).await?;
        let client = redis::Client::open(connection_string.as_str())
            .context("Failed to create Redis client")?;

        Ok(Self {
            pool,
            client,
            connection_string,
            host,
            port,
            _container: container,
        })
    }

    /// `RedisConnectionManager` over this container, as the invalidation
    /// channels take it.
    pub fn connection_manager(&self) -> RedisConnectionManager {
        RedisConnectionManager::new(self.pool.clone(), self.client.clone())
    }

    async fn create_pool(connection_string: &str) -> Result<RedisPool> {
        let mut cfg = RedisConfig::from_url(connection_string);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(10));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .context("Failed to create Redis pool")?;

        let mut attempts = 0;
        loop {
            match pool.get().await {
                Ok(mut conn) => {
                    match deadpool_redis::redis::cmd("PING")
                        .query_async::<()>(&mut conn)
                        .await
                    {
                        Ok(_) => break,
                        Err(_) if attempts < 20 => {
                            attempts += 1;
                            tokio::time::sleep(Duration::from_millis(500))
                                .await;
                            continue;
                        }
                        Err(e) => return Err(e).context("Redis not ready"),
                    }
                }
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
                Err(e) => {
                    return Err(e).context("Failed to get Redis connection");
                }
            }
        }

        Ok(pool)
    }

    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    pub async fn flush_db(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        deadpool_redis::redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
