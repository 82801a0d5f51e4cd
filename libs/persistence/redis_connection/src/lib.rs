use deadpool_redis::{Config, CreatePoolError, Runtime};
pub use deadpool_redis::{Pool, PoolError, redis::FromRedisValue};
pub use redis::{AsyncCommands, RedisError};
use tracing::{info, instrument};
use url::Url;

pub mod config;
pub mod connection;

pub use connection::RedisConnectionManager;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to create redis pool: {0}")]
    Pool(#[from] CreatePoolError),
    #[error("failed to create redis client: {0}")]
    Client(#[from] RedisError),
}

fn build_url<C>(config: &C) -> Url
where
    C: config::DbConnectConfig,
{
    let mut url = Url::parse("redis://").unwrap();

    url.set_host(Some(config.host())).unwrap();
    url.set_port(config.port().into()).unwrap();
    url.path_segments_mut()
        .unwrap()
        .extend(&[config.db().to_string()]);

    url
}

/// Build the command pool and the subscriber client from one config. The
/// caller owns the returned manager and injects it where needed.
#[instrument(skip_all, name = "connect-redis")]
pub async fn connect_redis_db<C>(
    config: &C,
) -> Result<RedisConnectionManager, ConnectError>
where
    C: config::DbConnectConfig,
{
    let url = build_url(config);

    info!(redis.url = %url, redis.connect = true);

    let cfg = Config {
        url: Some(url.to_string()),
        pool: Some(deadpool_redis::PoolConfig::default()),
        connection: None,
    };

    let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
    let client = redis::Client::open(url.to_string())?;

    Ok(RedisConnectionManager::new(pool, client))
}
