use async_trait::async_trait;
use once_cell::sync::OnceCell;
use redis::aio::MultiplexedConnection;
use redis::{Client as RedisClient, RedisResult};
use shaku::{Component, Interface};

#[async_trait]
pub trait RedisConnection: Interface {
    async fn get_connection(&self) -> RedisResult<MultiplexedConnection>;
}

pub fn default_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1".to_string())
}

#[derive(Component)]
#[shaku(interface = RedisConnection)]
pub struct RedisConnectionManager {
    #[shaku(default = default_redis_url())]
    url: String,

    client: OnceCell<RedisClient>,
}

impl RedisConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> RedisResult<&RedisClient> {
        self.client
            .get_or_try_init(|| RedisClient::open(self.url.as_str()))
    }
}

#[async_trait]
impl RedisConnection for RedisConnectionManager {
    async fn get_connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client()?.get_multiplexed_async_connection().await
    }
}
